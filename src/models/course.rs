//! Course descriptors.

use serde::{Deserialize, Serialize};

use crate::utils::url::extract_course_id;

/// A course page to watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Stable external identifier (used as the store key)
    pub id: String,

    /// Display name
    pub name: String,

    /// Course page URL
    pub url: String,
}

impl Course {
    /// Build a course, deriving its id from the `id` query parameter of the URL.
    pub fn from_url(url: impl Into<String>, name: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: extract_course_id(&url),
            name: name.into(),
            url,
        }
    }
}

/// Course entry as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEntry {
    /// Explicit id; derived from the URL when omitted
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    pub url: String,
}

impl From<&CourseEntry> for Course {
    fn from(entry: &CourseEntry) -> Self {
        match entry.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Course {
                id: id.to_string(),
                name: entry.name.clone(),
                url: entry.url.clone(),
            },
            None => Course::from_url(entry.url.clone(), entry.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_extracts_id() {
        let course = Course::from_url(
            "https://elearning.univ-bejaia.dz/course/view.php?id=19984",
            "Génie Civil",
        );
        assert_eq!(course.id, "19984");
    }

    #[test]
    fn test_entry_with_explicit_id_wins() {
        let entry = CourseEntry {
            id: Some("civil".into()),
            name: "Génie Civil".into(),
            url: "https://elearning.univ-bejaia.dz/course/view.php?id=19984".into(),
        };
        assert_eq!(Course::from(&entry).id, "civil");
    }

    #[test]
    fn test_entry_with_blank_id_derives_from_url() {
        let entry = CourseEntry {
            id: Some("  ".into()),
            name: "Informatique".into(),
            url: "https://elearning.univ-bejaia.dz/course/view.php?id=20008".into(),
        };
        assert_eq!(Course::from(&entry).id, "20008");
    }
}
