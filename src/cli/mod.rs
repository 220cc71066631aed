pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "estuary")]
#[command(about = "An offline-first RSS/Atom reader core", long_about = None)]
pub struct Cli {
    /// Override the database file from the config
    #[arg(long, global = true)]
    pub db: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to a feed
    Add {
        /// URL of the feed to add
        url: String,
        /// Category id to file the feed under
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Unsubscribe from a feed
    Remove {
        /// URL of the feed to remove
        url: String,
    },
    /// Refresh all feeds
    Update,
    /// List feeds or articles
    List {
        /// Show articles instead of feeds
        #[arg(long)]
        items: bool,
        /// Only unread articles
        #[arg(long, requires = "items")]
        unread: bool,
        /// Only favorited articles
        #[arg(long, requires = "items", conflicts_with = "unread")]
        favorites: bool,
    },
    /// Mark an article as read
    Read {
        /// Article id
        id: String,
    },
    /// Toggle an article's favorite flag
    Star {
        /// Article id
        id: String,
    },
    /// Run cache maintenance now
    Maintain,
    /// Show storage usage against the configured budget
    Quota,
    /// Queue an operation for the next time the network is available
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Replay queued offline operations
    SyncQueue,
    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Refresh and maintain in the foreground until interrupted
    Daemon {
        /// Refresh interval (e.g., "1h", "30m", "1d")
        #[arg(short, long)]
        interval: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// Subscribe later
    Add {
        url: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Unsubscribe later
    Remove {
        /// URL of the subscribed feed
        url: String,
    },
    /// Refresh one feed later
    Refresh {
        /// URL of the subscribed feed
        url: String,
    },
    /// Show pending operations
    List,
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// Create a category
    Add { name: String },
    /// List categories
    List,
    /// Delete a category; its feeds become uncategorized
    Remove { id: String },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::parse_from(["estuary", "list", "--items", "--unread"]);
        assert!(matches!(
            cli.command,
            Commands::List {
                items: true,
                unread: true,
                favorites: false
            }
        ));

        assert!(Cli::try_parse_from(["estuary", "list", "--unread"]).is_err());
        assert!(
            Cli::try_parse_from(["estuary", "list", "--items", "--unread", "--favorites"]).is_err()
        );
    }

    #[test]
    fn test_parse_queue_add() {
        let cli = Cli::parse_from(["estuary", "queue", "add", "https://example.com/feed.xml"]);
        match cli.command {
            Commands::Queue {
                action: QueueAction::Add { url, category },
            } => {
                assert_eq!(url, "https://example.com/feed.xml");
                assert!(category.is_none());
            }
            _ => panic!("expected queue add"),
        }
    }
}
