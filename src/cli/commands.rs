use crate::app::{AppContext, EstuaryError, Result};
use crate::domain::{Feed, SyncOperation};
use crate::store::{Store, StoreExt};
use crate::sync::{normalize_feed_url, RefreshSummary};

async fn feed_by_url(ctx: &AppContext, url: &str) -> Result<Feed> {
    ctx.store
        .find_active_feed_by_url(&normalize_feed_url(url)?)
        .await?
        .ok_or_else(|| EstuaryError::FeedNotFound(url.to_string()))
}

pub async fn add_feed(ctx: &AppContext, url: &str, category: Option<&str>) -> Result<()> {
    match ctx.scheduler.subscribe(url, category).await {
        Ok(feed) => {
            let count = ctx.store.articles_for_feed(&feed.id).await?.len();
            println!("Added feed: {}", feed.display_title());
            println!("Fetched {} articles", count);
            Ok(())
        }
        Err(EstuaryError::FeedAlreadyExists(url)) => {
            println!("Feed already exists: {}", url);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn remove_feed(ctx: &AppContext, url: &str) -> Result<()> {
    let feed = feed_by_url(ctx, url).await?;
    ctx.scheduler.unsubscribe(&feed.id).await?;
    println!("Removed feed: {}", url);
    Ok(())
}

pub async fn update_feeds(ctx: &AppContext) -> Result<()> {
    match ctx.scheduler.refresh_all_feeds().await? {
        RefreshSummary::AlreadyRunning => println!("A refresh is already running"),
        RefreshSummary::Completed(report) if report.feeds == 0 => println!("No feeds to update"),
        RefreshSummary::Completed(report) => println!(
            "Update complete: {} feeds, {} new articles, {} errors",
            report.feeds, report.new_articles, report.failed
        ),
    }
    Ok(())
}

pub async fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.active_feeds().await?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in feeds {
        let unread = ctx.store.unread_count(&feed.id).await?;
        let status = match (feed.paused, feed.error_count) {
            (true, _) => " [paused]".to_string(),
            (false, 0) => String::new(),
            (false, n) => format!(" [{} errors]", n),
        };
        println!(
            "{} ({} unread){}\n  {}",
            feed.display_title(),
            unread,
            status,
            feed.url
        );
    }

    Ok(())
}

pub async fn list_articles(ctx: &AppContext, unread: bool, favorites: bool) -> Result<()> {
    let articles = if unread {
        ctx.store.unread_articles().await?
    } else if favorites {
        ctx.store.favorite_articles().await?
    } else {
        let mut all = Vec::new();
        for feed in ctx.store.active_feeds().await? {
            all.extend(ctx.store.articles_for_feed(&feed.id).await?);
        }
        all.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        all
    };

    if articles.is_empty() {
        println!("No articles");
        return Ok(());
    }

    for article in articles {
        let read_marker = if article.is_read() { " " } else { "●" };
        let star = if article.is_favorite { "★" } else { " " };
        println!(
            "{}{} {} {}  {}",
            read_marker,
            star,
            article.published_at.format("%Y-%m-%d"),
            article.title,
            article.id
        );
    }

    Ok(())
}

pub async fn mark_read(ctx: &AppContext, article_id: &str) -> Result<()> {
    let article = ctx.store.mark_read(article_id).await?;
    println!("Read: {}", article.title);
    Ok(())
}

pub async fn toggle_star(ctx: &AppContext, article_id: &str) -> Result<()> {
    if ctx.store.toggle_favorite(article_id).await? {
        println!("Starred {}", article_id);
    } else {
        println!("Unstarred {}", article_id);
    }
    Ok(())
}

pub async fn maintain(ctx: &AppContext) -> Result<()> {
    let report = ctx.cache.run_maintenance().await?;
    println!(
        "Maintenance complete: {} articles deleted, {} feeds purged",
        report.articles_deleted(),
        report.purged_feeds
    );
    if report.still_critical {
        eprintln!("Storage is still above the critical threshold");
    }
    Ok(())
}

pub async fn show_quota(ctx: &AppContext) -> Result<()> {
    let quota = ctx.store.get_quota().await?;
    if quota.quota == 0 {
        println!("No storage budget configured");
        return Ok(());
    }

    println!(
        "{} of {} bytes used ({:.1}%), {} available",
        quota.usage, quota.quota, quota.percent_used, quota.available
    );
    if quota.is_exceeded() {
        println!("Quota exceeded");
    }
    Ok(())
}

pub async fn queue_add(ctx: &AppContext, url: &str, category: Option<String>) -> Result<()> {
    ctx.scheduler
        .queue_operation(SyncOperation::AddFeed {
            url: url.to_string(),
            category_id: category,
        })
        .await?;
    println!("Queued subscribe: {}", url);
    Ok(())
}

pub async fn queue_remove(ctx: &AppContext, url: &str) -> Result<()> {
    let feed = feed_by_url(ctx, url).await?;
    ctx.scheduler
        .queue_operation(SyncOperation::DeleteFeed { feed_id: feed.id })
        .await?;
    println!("Queued unsubscribe: {}", url);
    Ok(())
}

pub async fn queue_refresh(ctx: &AppContext, url: &str) -> Result<()> {
    let feed = feed_by_url(ctx, url).await?;
    ctx.scheduler
        .queue_operation(SyncOperation::RefreshFeed { feed_id: feed.id })
        .await?;
    println!("Queued refresh: {}", url);
    Ok(())
}

pub async fn queue_list(ctx: &AppContext) -> Result<()> {
    let pending = ctx.scheduler.pending_operations().await?;
    if pending.is_empty() {
        println!("No queued operations");
        return Ok(());
    }

    for queued in pending {
        println!(
            "{}  {}",
            queued.queued_at.format("%Y-%m-%d %H:%M:%S"),
            queued.operation.kind()
        );
    }
    Ok(())
}

pub async fn sync_queue(ctx: &AppContext) -> Result<()> {
    let report = ctx.scheduler.process_queued_operations().await?;
    println!(
        "Replayed {} queued operations, {} failed",
        report.replayed, report.failed
    );
    Ok(())
}

pub async fn add_category(ctx: &AppContext, name: &str) -> Result<()> {
    let category = ctx.store.create_category(name).await?;
    println!("Added category: {} ({})", category.name, category.id);
    Ok(())
}

pub async fn list_categories(ctx: &AppContext) -> Result<()> {
    let categories = ctx.store.categories().await?;
    if categories.is_empty() {
        println!("No categories");
        return Ok(());
    }

    for category in categories {
        let feeds = ctx.store.feeds_by_category(&category.id).await?.len();
        println!("{} ({} feeds)  {}", category.name, feeds, category.id);
    }
    Ok(())
}

pub async fn remove_category(ctx: &AppContext, category_id: &str) -> Result<()> {
    ctx.store.delete_category(category_id).await?;
    println!("Removed category: {}", category_id);
    Ok(())
}
