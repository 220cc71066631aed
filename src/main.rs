use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use estuary::app::AppContext;
use estuary::cli::{commands, CategoryAction, Cli, Commands, QueueAction};
use estuary::config::Config;
use estuary::daemon::{Daemon, DaemonConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("estuary=info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.storage.db_path = Some(db);
    }
    let ctx = AppContext::new(config).await?;

    match cli.command {
        Commands::Add { url, category } => {
            commands::add_feed(&ctx, &url, category.as_deref()).await?;
        }
        Commands::Remove { url } => {
            commands::remove_feed(&ctx, &url).await?;
        }
        Commands::Update => {
            commands::update_feeds(&ctx).await?;
        }
        Commands::List {
            items,
            unread,
            favorites,
        } => {
            if items {
                commands::list_articles(&ctx, unread, favorites).await?;
            } else {
                commands::list_feeds(&ctx).await?;
            }
        }
        Commands::Read { id } => {
            commands::mark_read(&ctx, &id).await?;
        }
        Commands::Star { id } => {
            commands::toggle_star(&ctx, &id).await?;
        }
        Commands::Maintain => {
            commands::maintain(&ctx).await?;
        }
        Commands::Quota => {
            commands::show_quota(&ctx).await?;
        }
        Commands::Queue { action } => match action {
            QueueAction::Add { url, category } => commands::queue_add(&ctx, &url, category).await?,
            QueueAction::Remove { url } => commands::queue_remove(&ctx, &url).await?,
            QueueAction::Refresh { url } => commands::queue_refresh(&ctx, &url).await?,
            QueueAction::List => commands::queue_list(&ctx).await?,
        },
        Commands::SyncQueue => {
            commands::sync_queue(&ctx).await?;
        }
        Commands::Category { action } => match action {
            CategoryAction::Add { name } => commands::add_category(&ctx, &name).await?,
            CategoryAction::List => commands::list_categories(&ctx).await?,
            CategoryAction::Remove { id } => commands::remove_category(&ctx, &id).await?,
        },
        Commands::Daemon { interval } => {
            let mut daemon_config = DaemonConfig::from_context(&ctx);
            if let Some(interval) = interval {
                daemon_config.refresh_interval_secs =
                    DaemonConfig::parse_interval(&interval).map_err(anyhow::Error::msg)?;
            }
            Daemon::new(Arc::new(ctx), daemon_config).run().await?;
        }
    }

    Ok(())
}
