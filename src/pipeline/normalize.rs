// src/pipeline/normalize.rs

//! Row normalization.
//!
//! Turns a raw extracted row into an [`Item`] whose identity key stays the same
//! across page loads of unchanged content.

use url::Url;

use crate::models::{Item, RawRow};
use crate::utils::url::canonicalize;

/// Canonicalizes raw rows against the portal origin.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base: Url,
}

impl Normalizer {
    /// Create a normalizer resolving relative links against `base`.
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Normalize one row. Returns `None` when the title is blank.
    pub fn normalize(&self, row: &RawRow) -> Option<Item> {
        let title = row.title.trim();
        if title.is_empty() {
            return None;
        }

        let href = row
            .href
            .as_deref()
            .filter(|href| !href.trim().is_empty())
            .map(|href| canonicalize(&self.base, href));

        Some(Item {
            kind: row.kind,
            title: title.to_string(),
            href,
            context: row.context.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    fn normalizer() -> Normalizer {
        Normalizer::new(Url::parse("https://elearning.univ-bejaia.dz").unwrap())
    }

    #[test]
    fn test_whitespace_title_is_discarded() {
        let row = RawRow::new(ItemKind::Text, "   \n\t ");
        assert!(normalizer().normalize(&row).is_none());
    }

    #[test]
    fn test_title_is_trimmed() {
        let row = RawRow::new(ItemKind::Heading, "\n  Semestre 1  ");
        let item = normalizer().normalize(&row).unwrap();
        assert_eq!(item.title, "Semestre 1");
        assert_eq!(item.kind, ItemKind::Heading);
        assert!(item.href.is_none());
    }

    #[test]
    fn test_volatile_params_do_not_change_identity() {
        let n = normalizer();
        let a = n
            .normalize(&RawRow::new(ItemKind::File, "TD 1").with_href(
                "https://elearning.univ-bejaia.dz/mod/resource/view.php?id=5&sesskey=abc#top",
            ))
            .unwrap();
        let b = n
            .normalize(
                &RawRow::new(ItemKind::Link, "TD 1 (pdf)")
                    .with_href("https://elearning.univ-bejaia.dz/mod/resource/view.php?id=5"),
            )
            .unwrap();
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_relative_href_is_resolved() {
        let item = normalizer()
            .normalize(&RawRow::new(ItemKind::Link, "Forum").with_href("/mod/forum/view.php?id=7"))
            .unwrap();
        assert_eq!(
            item.href.as_deref(),
            Some("https://elearning.univ-bejaia.dz/mod/forum/view.php?id=7")
        );
    }

    #[test]
    fn test_blank_href_is_treated_as_absent() {
        let item = normalizer()
            .normalize(&RawRow::new(ItemKind::Text, "Notes").with_href("  "))
            .unwrap();
        assert!(item.href.is_none());
        assert_eq!(item.identity_key(), "title:notes");
    }

    #[test]
    fn test_malformed_href_kept_verbatim() {
        let item = normalizer()
            .normalize(&RawRow::new(ItemKind::Link, "Broken").with_href("http://[oops"))
            .unwrap();
        assert_eq!(item.href.as_deref(), Some("http://[oops"));
    }

    #[test]
    fn test_context_passes_through() {
        let item = normalizer()
            .normalize(&RawRow::new(ItemKind::File, "Cours").with_context(" Semaine 1 "))
            .unwrap();
        assert_eq!(item.context.as_deref(), Some(" Semaine 1 "));
    }
}
