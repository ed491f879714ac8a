// src/services/telegram.rs

//! Telegram Bot API delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;
use crate::storage::SnapshotStore;

use super::notifier::Notifier;

/// Setting under which a discovered chat id is persisted.
pub const CHAT_ID_SETTING: &str = "telegram.chat_id";

/// Telegram's limit on message text length.
const MAX_MESSAGE_CHARS: usize = 4096;
const TRUNCATION_MARK: &str = "\n…";

/// Sends change reports to one Telegram chat.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

impl TelegramNotifier {
    /// Build the notifier and resolve its chat id.
    ///
    /// Lookup order: configured id, stored setting, then the most recent private
    /// chat in the bot's pending updates (which is stored for later runs).
    pub async fn connect(config: &TelegramConfig, token: &str, store: &dyn SnapshotStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = format!("{}/bot{}", config.api_base.trim_end_matches('/'), token);

        let chat_id = match configured_chat_id(config) {
            Some(id) => id,
            None => resolve_chat_id(&client, &endpoint, store).await?,
        };

        Ok(Self {
            client,
            endpoint,
            chat_id,
        })
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(format!("{}/sendMessage", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::notify(e.without_url()))?;

        let status = response.status();
        let reply: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AppError::notify(e.without_url()))?;
        if !reply.ok {
            return Err(AppError::notify(format!(
                "sendMessage failed ({}): {}",
                status,
                reply.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, course_name: &str, course_url: &str, lines: &[String]) -> Result<()> {
        let message = build_message(course_name, course_url, lines, MAX_MESSAGE_CHARS);
        self.send_message(&message).await?;
        log::info!("Sent {} change line(s) for {} to Telegram", lines.len(), course_name);
        Ok(())
    }
}

fn configured_chat_id(config: &TelegramConfig) -> Option<String> {
    config
        .chat_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

async fn resolve_chat_id(client: &Client, endpoint: &str, store: &dyn SnapshotStore) -> Result<String> {
    if let Some(id) = store.get_setting(CHAT_ID_SETTING).await? {
        log::debug!("Using stored Telegram chat id");
        return Ok(id);
    }

    let discovered = match discover_chat_id(client, endpoint).await {
        Ok(found) => found,
        Err(e) => {
            log::warn!("Telegram chat discovery failed: {e}");
            None
        }
    };

    let Some(chat_id) = discovered else {
        return Err(AppError::config(
            "telegram.chat_id not set and no private chat found; send /start to the bot and retry",
        ));
    };

    store.put_setting(CHAT_ID_SETTING, &chat_id).await?;
    log::info!("Discovered Telegram chat id {chat_id}");
    Ok(chat_id)
}

async fn discover_chat_id(client: &Client, endpoint: &str) -> Result<Option<String>> {
    let reply: ApiResponse<Vec<Update>> = client
        .get(format!("{endpoint}/getUpdates"))
        .send()
        .await
        .map_err(|e| e.without_url())?
        .json()
        .await
        .map_err(|e| e.without_url())?;

    if !reply.ok {
        return Err(AppError::notify(format!(
            "getUpdates failed: {}",
            reply.description.unwrap_or_default()
        )));
    }
    Ok(last_private_chat(&reply.result.unwrap_or_default()))
}

/// Id of the most recent private chat among the updates.
fn last_private_chat(updates: &[Update]) -> Option<String> {
    updates
        .iter()
        .rev()
        .filter_map(|u| u.message.as_ref())
        .find(|m| m.chat.kind == "private")
        .map(|m| m.chat.id.to_string())
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the HTML message for one course, keeping it within `max_chars`.
///
/// Lines are escaped one at a time and only whole lines are kept, so a cut
/// never lands inside an entity. When lines are dropped the message ends with
/// a truncation mark. A first line too long to fit on its own is cut on a
/// grapheme boundary of the raw text.
pub fn build_message(course_name: &str, course_url: &str, lines: &[String], max_chars: usize) -> String {
    let mut message = format!(
        "<b>{}</b>\n<a href=\"{}\">Open course</a>\n",
        escape_html(course_name),
        escape_html(course_url)
    );
    let mark_len = TRUNCATION_MARK.chars().count();
    let mut used = message.chars().count();

    for (i, line) in lines.iter().enumerate() {
        let escaped = escape_html(line);
        let cost = 1 + escaped.chars().count();
        let reserve = if i + 1 < lines.len() { mark_len } else { 0 };
        if used + cost + reserve <= max_chars {
            message.push('\n');
            message.push_str(&escaped);
            used += cost;
            continue;
        }

        if i == 0 {
            let budget = max_chars.saturating_sub(used + 1 + mark_len);
            let partial = escape_prefix(line, budget);
            if !partial.is_empty() {
                message.push('\n');
                message.push_str(&partial);
            }
        }
        message.push_str(TRUNCATION_MARK);
        break;
    }
    message
}

/// Escape the longest grapheme prefix of `text` whose escaped form fits in
/// `budget` characters.
fn escape_prefix(text: &str, budget: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for grapheme in text.graphemes(true) {
        let escaped = escape_html(grapheme);
        let len = escaped.chars().count();
        if used + len > budget {
            break;
        }
        used += len;
        out.push_str(&escaped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("TD <1> & \"2\""), "TD &lt;1&gt; &amp; &quot;2&quot;");
    }

    #[test]
    fn test_build_message_layout() {
        let lines = vec!["Added: Cours <intro>".to_string(), "Removed: TP 1".to_string()];
        let message = build_message(
            "Génie Civil & Archi",
            "https://elearning.univ-bejaia.dz/course/view.php?id=1&x=2",
            &lines,
            MAX_MESSAGE_CHARS,
        );

        assert_eq!(
            message,
            "<b>Génie Civil &amp; Archi</b>\n\
             <a href=\"https://elearning.univ-bejaia.dz/course/view.php?id=1&amp;x=2\">Open course</a>\n\
             \n\
             Added: Cours &lt;intro&gt;\n\
             Removed: TP 1"
        );
    }

    /// Every `&` must open a complete entity.
    fn entities_are_whole(message: &str) -> bool {
        message
            .match_indices('&')
            .all(|(i, _)| ["&amp;", "&lt;", "&gt;", "&quot;"].iter().any(|e| message[i..].starts_with(e)))
    }

    #[test]
    fn test_long_report_is_cut_on_whole_lines() {
        let lines: Vec<String> = (0..300).map(|i| format!("Added: TD & TP {i}")).collect();
        let message = build_message(
            "Réseaux",
            "https://elearning.univ-bejaia.dz/course/view.php?id=7",
            &lines,
            MAX_MESSAGE_CHARS,
        );

        assert!(message.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(message.ends_with(TRUNCATION_MARK));
        assert!(entities_are_whole(&message));

        let body = message.trim_end_matches(TRUNCATION_MARK);
        let last = body.lines().last().unwrap();
        assert!(last.starts_with("Added: TD &amp; TP "));
        assert!(last["Added: TD &amp; TP ".len()..].parse::<usize>().is_ok());
    }

    #[test]
    fn test_no_cut_inside_an_entity_at_any_limit() {
        let lines: Vec<String> = (0..5).map(|i| format!("Modified: A & B -> \"C\" <{i}>")).collect();
        let full = build_message("C", "u", &lines, usize::MAX);
        let header = build_message("C", "u", &[], usize::MAX).chars().count();

        for max_chars in header + 3..full.chars().count() {
            let message = build_message("C", "u", &lines, max_chars);
            assert!(message.chars().count() <= max_chars, "limit {max_chars}");
            assert!(message.ends_with(TRUNCATION_MARK), "limit {max_chars}");
            assert!(entities_are_whole(&message), "limit {max_chars}: {message}");
        }
        assert_eq!(build_message("C", "u", &lines, full.chars().count()), full);
    }

    #[test]
    fn test_oversized_first_line_cut_on_graphemes() {
        // "e" + combining acute accent is one grapheme of two chars
        let lines = vec!["e\u{301} & ".repeat(50), "Removed: TP 1".to_string()];
        let header = build_message("C", "u", &[], usize::MAX).chars().count();
        let max_chars = header + 20;
        let message = build_message("C", "u", &lines, max_chars);

        assert!(message.chars().count() <= max_chars);
        assert!(message.ends_with(TRUNCATION_MARK));
        assert!(entities_are_whole(&message));
        let body = message.trim_end_matches(TRUNCATION_MARK);
        assert!(body.len() > header);
        assert!(!body.ends_with('e'));
        assert!(!message.contains("Removed"));
    }

    #[test]
    fn test_last_private_chat() {
        let updates: Vec<Update> = serde_json::from_str(
            r#"[
                {"update_id": 1, "message": {"chat": {"id": 11, "type": "private"}}},
                {"update_id": 2, "message": {"chat": {"id": -5, "type": "group"}}},
                {"update_id": 3, "edited_message": {}},
                {"update_id": 4, "message": {"chat": {"id": 12, "type": "private"}}},
                {"update_id": 5, "message": {"chat": {"id": -6, "type": "supergroup"}}}
            ]"#,
        )
        .unwrap();
        assert_eq!(last_private_chat(&updates).as_deref(), Some("12"));
        assert!(last_private_chat(&updates[1..3]).is_none());
    }

    #[tokio::test]
    async fn test_stored_chat_id_is_used() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.put_setting(CHAT_ID_SETTING, "777").await.unwrap();

        let config = TelegramConfig::default();
        let notifier = TelegramNotifier::connect(&config, "123:abc", &store).await.unwrap();
        assert_eq!(notifier.chat_id, "777");
        assert!(notifier.endpoint.ends_with("/bot123:abc"));
    }

    #[tokio::test]
    async fn test_configured_chat_id_wins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.put_setting(CHAT_ID_SETTING, "777").await.unwrap();

        let config = TelegramConfig {
            chat_id: Some(" 42 ".into()),
            ..TelegramConfig::default()
        };
        let notifier = TelegramNotifier::connect(&config, "123:abc", &store).await.unwrap();
        assert_eq!(notifier.chat_id, "42");
    }
}
