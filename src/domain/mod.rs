pub mod article;
pub mod category;
pub mod feed;
pub mod settings;
pub mod sync_state;

pub use article::Article;
pub use category::Category;
pub use feed::{Feed, FeedUpdate};
pub use settings::{AiProviderConfig, Theme, UserSettings};
pub use sync_state::{QueuedOperation, SyncOperation, SyncState};
