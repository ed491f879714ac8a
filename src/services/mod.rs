//! Service layer for the course watcher.
//!
//! This module contains the collaborators around the monitor core:
//! - Course page acquisition (`HttpAcquisition`, `PageExtractor`)
//! - Change notification (`TelegramNotifier`, `LogNotifier`)

mod acquisition;
mod extract;
mod notifier;
mod telegram;

pub use acquisition::{Acquisition, AcquisitionSession, HttpAcquisition};
pub use extract::{PageExtractor, parse_selector};
pub use notifier::{LogNotifier, Notifier, build_notifier};
pub use telegram::{CHAT_ID_SETTING, TelegramNotifier, build_message, escape_html};
