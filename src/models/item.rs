//! Raw extracted rows and their normalized item form.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of page element a row was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Heading,
    File,
    Text,
    Link,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Heading => "heading",
            ItemKind::File => "file",
            ItemKind::Text => "text",
            ItemKind::Link => "link",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row as handed over by the acquisition layer, before any cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub kind: ItemKind,

    /// Raw text, may carry whitespace noise
    pub title: String,

    /// Absolute or relative URL
    #[serde(default)]
    pub href: Option<String>,

    /// Free text such as the enclosing section name
    #[serde(default)]
    pub context: Option<String>,
}

impl RawRow {
    pub fn new(kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            href: None,
            context: None,
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A normalized item as stored inside a snapshot.
///
/// Field order and names are part of the content hash input, so they must not
/// be reordered or renamed without invalidating every stored hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub kind: ItemKind,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Item {
    /// Key under which this item is recognized as the same entity across runs.
    pub fn identity_key(&self) -> String {
        match &self.href {
            Some(href) => format!("href:{href}"),
            None => format!("title:{}", self.title.trim().to_lowercase()),
        }
    }
}
