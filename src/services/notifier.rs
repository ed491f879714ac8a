// src/services/notifier.rs

//! Change notification delivery.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::TelegramConfig;
use crate::storage::SnapshotStore;

use super::telegram::TelegramNotifier;

/// Delivers one notification per changed course.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, course_name: &str, course_url: &str, lines: &[String]) -> Result<()>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, course_name: &str, course_url: &str, lines: &[String]) -> Result<()> {
        log::info!("[dry-run] {} ({}): {} line(s)", course_name, course_url, lines.len());
        for line in lines {
            log::info!("[dry-run]   {}", line);
        }
        Ok(())
    }
}

/// Pick the notifier once at startup.
///
/// Without a bot token notifications are only logged. With one, the chat id is
/// resolved now so that a missing chat fails the configuration instead of each
/// delivery.
pub async fn build_notifier(
    config: &TelegramConfig,
    store: &dyn SnapshotStore,
) -> Result<Arc<dyn Notifier>> {
    match config.bot_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => {
            let notifier = TelegramNotifier::connect(config, token, store).await?;
            Ok(Arc::new(notifier))
        }
        None => {
            log::warn!("telegram.bot_token not set; notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
