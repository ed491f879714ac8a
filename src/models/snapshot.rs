//! Course snapshots and the change records computed between two of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Item;

/// Deduplicated, hashed state of one course page at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSnapshot {
    /// Stable external identifier of the course
    pub course_id: String,

    pub course_name: String,

    /// Course page URL
    pub url: String,

    /// When the page was fetched (not part of the content hash)
    pub fetched_at: DateTime<Utc>,

    /// Ordered items, unique by identity key
    pub items: Vec<Item>,

    /// Hex SHA-256 over the serialized item list
    pub content_hash: String,
}

impl CourseSnapshot {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// One difference between a previous and a current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetail {
    pub change_type: ChangeType,

    /// Current item, or the removed item for `Removed`
    pub item: Item,

    /// Previous version, only for `Modified`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Item>,
}

impl ChangeDetail {
    pub fn added(item: Item) -> Self {
        Self {
            change_type: ChangeType::Added,
            item,
            previous: None,
        }
    }

    pub fn removed(item: Item) -> Self {
        Self {
            change_type: ChangeType::Removed,
            item,
            previous: None,
        }
    }

    pub fn modified(previous: Item, item: Item) -> Self {
        Self {
            change_type: ChangeType::Modified,
            item,
            previous: Some(previous),
        }
    }

    /// One-line human-readable description used in notifications.
    pub fn describe(&self) -> String {
        let title = self.item.title.trim();
        let link = if self.item.href.is_some() { " (link)" } else { "" };

        match self.change_type {
            ChangeType::Added => format!("Added: {title}{link}"),
            ChangeType::Removed => format!("Removed: {title}{link}"),
            ChangeType::Modified => match &self.previous {
                Some(prev) if prev.title.trim() != title => {
                    format!("Modified: {} -> {title}{link}", prev.title.trim())
                }
                _ => format!("Modified: {title}{link}"),
            },
        }
    }
}
