//! Foreground daemon: replays the offline queue, then keeps feeds fresh and
//! the cache trimmed until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::{AppContext, EstuaryError, Result};
use crate::store::StoreExt;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub refresh_interval_secs: u64,
    pub maintenance_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30 * 60,
            maintenance_interval_secs: 60 * 60,
        }
    }
}

impl DaemonConfig {
    pub fn from_context(ctx: &AppContext) -> Self {
        Self {
            refresh_interval_secs: ctx.config.sync.interval_minutes * 60,
            maintenance_interval_secs: ctx.config.cache.maintenance_interval_minutes * 60,
        }
    }

    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let (digits, unit) = match s.char_indices().last() {
            Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], Some(c)),
            _ => (s.as_str(), None),
        };
        let multiplier = match unit {
            Some('d') => 86400,
            Some('h') => 3600,
            Some('m') => 60,
            Some('s') | None => 1,
            Some(other) => {
                return Err(format!(
                    "Unknown interval unit '{}'. Use format like '1h', '30m', '1d'",
                    other
                ))
            }
        };

        let value = digits
            .parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))?;
        if value == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        value
            .checked_mul(multiplier)
            .ok_or_else(|| format!("Interval too large: {}", s))
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self { ctx, config }
    }

    /// Run until ctrl-c (or SIGTERM on unix).
    pub async fn run(&self) -> Result<()> {
        if self.config.refresh_interval_secs == 0 || self.config.maintenance_interval_secs == 0 {
            return Err(EstuaryError::Config(
                "Daemon intervals must be greater than zero".into(),
            ));
        }

        info!(
            refresh = %DaemonConfig::format_interval(self.config.refresh_interval_secs),
            maintenance = %DaemonConfig::format_interval(self.config.maintenance_interval_secs),
            pid = std::process::id(),
            "Estuary daemon started"
        );

        self.replay_queue().await;

        let scheduler = &self.ctx.scheduler;
        if self.ctx.store.settings().await?.background_sync_enabled {
            scheduler.start_auto_refresh_with_period(Duration::from_secs(
                self.config.refresh_interval_secs,
            ));
        } else {
            warn!("Background sync disabled in settings, only running maintenance");
        }

        let mut maintenance = interval(Duration::from_secs(self.config.maintenance_interval_secs));
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);
        maintenance.tick().await; // Skip the first immediate tick

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = maintenance.tick() => self.run_maintenance().await,
            }
        }

        info!("Daemon shutting down");
        scheduler.stop_auto_refresh();
        Ok(())
    }

    async fn replay_queue(&self) {
        match self.ctx.scheduler.process_queued_operations().await {
            Ok(report) if report.replayed + report.failed > 0 => info!(
                replayed = report.replayed,
                failed = report.failed,
                "Replayed offline queue"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Failed to replay offline queue"),
        }
    }

    async fn run_maintenance(&self) {
        match self.ctx.cache.run_maintenance().await {
            Ok(report) => info!(
                deleted = report.articles_deleted(),
                purged_feeds = report.purged_feeds,
                still_critical = report.still_critical,
                "Scheduled maintenance finished"
            ),
            Err(e) => error!(error = %e, "Scheduled maintenance failed"),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, waiting for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
