use thiserror::Error;

use crate::store::Collection;

/// Errors raised while turning a raw feed document into a [`ParsedFeed`](crate::parser::ParsedFeed).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Unsupported feed format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid feed structure: {0}")]
    InvalidFeedStructure(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store used before init()")]
    NotInitialized,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage rejected the operation: {0}")]
    Rejected(String),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown index '{index}' on {collection}")]
    UnknownIndex {
        collection: Collection,
        index: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Rejected(e.to_string())
    }
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        StoreError::Rejected(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum EstuaryError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Feed parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Already subscribed to {0}")]
    FeedAlreadyExists(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EstuaryError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
