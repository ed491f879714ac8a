//! Diff calculation between two snapshots of the same course.
//!
//! Items are matched by identity key. Output order is deterministic: added
//! items in current order, then removed items in previous order, then
//! modified items in current order.

use std::collections::{HashMap, HashSet};

use crate::models::{ChangeDetail, CourseSnapshot, Item};

/// Calculator for computing diffs between snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffCalculator;

impl DiffCalculator {
    /// Create a new diff calculator.
    pub fn new() -> Self {
        Self
    }

    /// Calculate the changes from `previous` to `current`.
    pub fn calculate(&self, previous: &CourseSnapshot, current: &CourseSnapshot) -> Vec<ChangeDetail> {
        debug_assert_eq!(previous.course_id, current.course_id);

        let prev_keyed = keyed(&previous.items);
        let curr_keyed = keyed(&current.items);

        let prev_map: HashMap<&str, &Item> = prev_keyed.iter().map(|(k, i)| (k.as_str(), *i)).collect();
        let curr_map: HashMap<&str, &Item> = curr_keyed.iter().map(|(k, i)| (k.as_str(), *i)).collect();

        let mut changes = Vec::new();

        // Added: in current but not in previous
        for (key, item) in &curr_keyed {
            if !prev_map.contains_key(key.as_str()) {
                changes.push(ChangeDetail::added((*item).clone()));
            }
        }

        // Removed: in previous but not in current
        for (key, item) in &prev_keyed {
            if !curr_map.contains_key(key.as_str()) {
                changes.push(ChangeDetail::removed((*item).clone()));
            }
        }

        // Modified: in both but title or context changed
        for (key, curr) in &curr_keyed {
            let Some(prev) = prev_map.get(key.as_str()) else {
                continue;
            };
            if is_modified(prev, curr) {
                changes.push(ChangeDetail::modified((*prev).clone(), (*curr).clone()));
            }
        }

        changes
    }
}

/// Items paired with their identity key, first occurrence per key only.
fn keyed(items: &[Item]) -> Vec<(String, &Item)> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| {
            let key = item.identity_key();
            seen.insert(key.clone()).then_some((key, item))
        })
        .collect()
}

/// Title (trimmed) or context (empty equals absent) differ.
///
/// Links are not compared: under an href key they cannot differ, and under a
/// title key a link appearing or disappearing is not reported.
fn is_modified(prev: &Item, curr: &Item) -> bool {
    prev.title.trim() != curr.title.trim()
        || prev.context.as_deref().unwrap_or("") != curr.context.as_deref().unwrap_or("")
}

/// Convenience function to calculate diff.
pub fn diff_snapshots(previous: &CourseSnapshot, current: &CourseSnapshot) -> Vec<ChangeDetail> {
    DiffCalculator::new().calculate(previous, current)
}
