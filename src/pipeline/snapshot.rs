// src/pipeline/snapshot.rs

//! Snapshot building: normalization, first-wins deduplication and hashing.

use std::collections::HashSet;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{Course, CourseSnapshot, Item, RawRow};

use super::normalize::Normalizer;

/// Builds [`CourseSnapshot`]s from raw rows.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    normalizer: Normalizer,
}

impl SnapshotBuilder {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Build the snapshot for a course from its extracted rows.
    pub fn build_for(&self, course: &Course, rows: &[RawRow]) -> Result<CourseSnapshot> {
        self.build(&course.id, &course.name, &course.url, rows)
    }

    /// Build a snapshot.
    ///
    /// Rows with blank titles are dropped. When several rows share an identity
    /// key the first one is kept verbatim, so acquisition passes that emit
    /// specific kinds should run before generic link passes.
    pub fn build(
        &self,
        course_id: &str,
        course_name: &str,
        url: &str,
        rows: &[RawRow],
    ) -> Result<CourseSnapshot> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut dropped = 0usize;

        for row in rows {
            let Some(item) = self.normalizer.normalize(row) else {
                dropped += 1;
                continue;
            };
            if seen.insert(item.identity_key()) {
                items.push(item);
            } else {
                dropped += 1;
            }
        }

        log::debug!(
            "Built snapshot for {}: {} items from {} rows ({} dropped)",
            course_id,
            items.len(),
            rows.len(),
            dropped
        );

        let content_hash = content_hash(&items)?;
        Ok(CourseSnapshot {
            course_id: course_id.to_string(),
            course_name: course_name.to_string(),
            url: url.to_string(),
            fetched_at: Utc::now(),
            items,
            content_hash,
        })
    }
}

/// Hex SHA-256 of the JSON serialization of an item list.
pub fn content_hash(items: &[Item]) -> Result<String> {
    let bytes = serde_json::to_vec(items)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;
    use url::Url;

    fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new(Normalizer::new(
            Url::parse("https://elearning.univ-bejaia.dz").unwrap(),
        ))
    }

    fn rows() -> Vec<RawRow> {
        vec![
            RawRow::new(ItemKind::Heading, "Généralités"),
            RawRow::new(ItemKind::File, " Emploi du temps S1 ")
                .with_href("/mod/resource/view.php?id=101")
                .with_context("Généralités"),
            RawRow::new(ItemKind::Text, "   "),
            RawRow::new(ItemKind::Link, "Emploi du temps S1")
                .with_href("https://elearning.univ-bejaia.dz/mod/resource/view.php?id=101&forcedownload=1"),
            RawRow::new(ItemKind::Link, "Annonces").with_href("/mod/forum/view.php?id=7"),
        ]
    }

    fn build(rows: &[RawRow]) -> CourseSnapshot {
        builder().build("19984", "Génie Civil", "https://x/course/view.php?id=19984", rows).unwrap()
    }

    #[test]
    fn test_blank_rows_are_discarded() {
        let snapshot = build(&rows());
        assert!(snapshot.items.iter().all(|i| !i.title.trim().is_empty()));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let snapshot = build(&rows());
        assert_eq!(snapshot.item_count(), 3);

        let timetable = &snapshot.items[1];
        assert_eq!(timetable.kind, ItemKind::File);
        assert_eq!(timetable.title, "Emploi du temps S1");
        assert_eq!(timetable.context.as_deref(), Some("Généralités"));
    }

    #[test]
    fn test_title_keys_dedup_case_insensitively() {
        let snapshot = build(&[
            RawRow::new(ItemKind::Heading, "Semaine 1"),
            RawRow::new(ItemKind::Text, "SEMAINE 1").with_context("other"),
        ]);
        assert_eq!(snapshot.item_count(), 1);
        assert_eq!(snapshot.items[0].kind, ItemKind::Heading);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = build(&rows());
        let b = build(&rows());
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_hash_changes_with_title() {
        let mut changed = rows();
        changed[4].title = "Annonces (nouveau)".into();
        assert_ne!(build(&rows()).content_hash, build(&changed).content_hash);
    }

    #[test]
    fn test_hash_changes_with_href() {
        let mut changed = rows();
        changed[4].href = Some("/mod/forum/view.php?id=8".into());
        assert_ne!(build(&rows()).content_hash, build(&changed).content_hash);
    }

    #[test]
    fn test_hash_changes_with_order() {
        let mut reordered = rows();
        reordered.swap(0, 4);
        assert_ne!(build(&rows()).content_hash, build(&reordered).content_hash);
    }

    #[test]
    fn test_hash_ignores_volatile_params() {
        let mut noisy = rows();
        noisy[4].href = Some("/mod/forum/view.php?id=7&sesskey=zz#p1".into());
        assert_eq!(build(&rows()).content_hash, build(&noisy).content_hash);
    }

    #[test]
    fn test_empty_rows_give_empty_list_hash() {
        let snapshot = build(&[]);
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.content_hash, content_hash(&[]).unwrap());
    }
}
