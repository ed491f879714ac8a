//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Course, CourseEntry};
use crate::utils::schedule::parse_schedule;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Portal access settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Run behavior
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Snapshot persistence backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram delivery
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Courses to watch
    #[serde(default)]
    pub courses: Vec<CourseEntry>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to load config from {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (environment-shaped names).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("ELEARNING_BASE_URL") {
            self.portal.base_url = v;
        }
        if let Some(v) = get("PORTAL_SESSION_COOKIE") {
            self.portal.session_cookie = Some(v);
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(v);
        }
        if let Some(v) = get("SCRAPE_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) => self.monitor.max_concurrent = n.max(1),
                Err(_) => log::warn!("Ignoring invalid SCRAPE_CONCURRENCY '{v}'"),
            }
        }
        if let Some(v) = get("CRON_SCHEDULE") {
            self.monitor.schedule = v;
        }
        if let Some(v) = get("STORAGE_BACKEND") {
            match v.parse() {
                Ok(backend) => self.storage.backend = backend,
                Err(e) => log::warn!("Ignoring STORAGE_BACKEND: {e}"),
            }
        }
        if let Some(v) = get("S3_BUCKET") {
            self.storage.s3_bucket = Some(v);
        }
        if let Some(v) = get("S3_PREFIX") {
            self.storage.s3_prefix = v;
        }
    }

    /// Watched courses with their ids resolved.
    pub fn courses(&self) -> Vec<Course> {
        self.courses.iter().map(Course::from).collect()
    }

    /// Parsed portal origin.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.portal.base_url).map_err(|e| {
            AppError::config(format!("portal.base_url '{}': {e}", self.portal.base_url))
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.base_url()
            .map_err(|e| AppError::validation(e.to_string()))?;
        if self.portal.user_agent.trim().is_empty() {
            return Err(AppError::validation("portal.user_agent is empty"));
        }
        if self.portal.timeout_secs == 0 {
            return Err(AppError::validation("portal.timeout_secs must be > 0"));
        }
        if self.monitor.max_concurrent == 0 {
            return Err(AppError::validation("monitor.max_concurrent must be > 0"));
        }
        if self.monitor.max_report_lines == 0 {
            return Err(AppError::validation("monitor.max_report_lines must be > 0"));
        }
        parse_schedule(&self.monitor.schedule).map_err(|e| match e {
            AppError::Config(message) => AppError::validation(message),
            other => other,
        })?;
        if self.storage.backend == StorageBackend::S3
            && self.storage.s3_bucket.as_deref().is_none_or(|b| b.trim().is_empty())
        {
            return Err(AppError::validation("storage.s3_bucket is required for the s3 backend"));
        }
        if self.courses.is_empty() {
            return Err(AppError::validation("No courses defined"));
        }

        let mut seen = HashSet::new();
        for course in self.courses() {
            if Url::parse(&course.url).is_err() {
                return Err(AppError::validation(format!(
                    "course '{}' has an invalid url: {}",
                    course.name, course.url
                )));
            }
            if !seen.insert(course.id.clone()) {
                return Err(AppError::validation(format!(
                    "duplicate course id '{}'",
                    course.id
                )));
            }
        }
        Ok(())
    }
}

/// Portal access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Origin used to resolve relative links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pre-established session cookie, e.g. `MoodleSession=...`
    #[serde(default)]
    pub session_cookie: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            session_cookie: None,
        }
    }
}

/// Run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum number of courses processed at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum change lines in one notification
    #[serde(default = "defaults::max_report_lines")]
    pub max_report_lines: usize,

    /// `*/N * * * *` or a plain duration such as `15m`
    #[serde(default = "defaults::schedule")]
    pub schedule: String,

    /// Run once immediately when the watcher starts
    #[serde(default = "defaults::run_on_startup")]
    pub run_on_startup: bool,
}

impl MonitorConfig {
    pub fn interval(&self) -> Result<Duration> {
        parse_schedule(&self.schedule)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            max_report_lines: defaults::max_report_lines(),
            schedule: defaults::schedule(),
            run_on_startup: defaults::run_on_startup(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "file" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            other => Err(AppError::config(format!("unknown storage backend '{other}'"))),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the local store
    #[serde(default = "defaults::local_dir")]
    pub local_dir: String,

    #[serde(default)]
    pub s3_bucket: Option<String>,

    #[serde(default = "defaults::s3_prefix")]
    pub s3_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_dir: defaults::local_dir(),
            s3_bucket: None,
            s3_prefix: defaults::s3_prefix(),
        }
    }
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; without it notifications are only logged
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Target chat; discovered from recent updates when omitted
    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default = "defaults::telegram_api_base")]
    pub api_base: String,

    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: defaults::telegram_api_base(),
            timeout_secs: defaults::telegram_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Portal defaults
    pub fn base_url() -> String {
        "https://elearning.univ-bejaia.dz".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; course-watch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Monitor defaults
    pub fn max_concurrent() -> usize {
        3
    }
    pub fn max_report_lines() -> usize {
        50
    }
    pub fn schedule() -> String {
        "*/15 * * * *".into()
    }
    pub fn run_on_startup() -> bool {
        true
    }

    // Storage defaults
    pub fn local_dir() -> String {
        "data".into()
    }
    pub fn s3_prefix() -> String {
        "course-watch".into()
    }

    // Telegram defaults
    pub fn telegram_api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn telegram_timeout() -> u64 {
        20
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> Config {
        Config::from_toml(
            r#"
            [monitor]
            max_concurrent = 2

            [[courses]]
            name = "Affichage Département d'Informatique"
            url = "https://elearning.univ-bejaia.dz/course/view.php?id=20008"

            [[courses]]
            id = "maths"
            name = "Affichage Département de Mathématiques"
            url = "https://elearning.univ-bejaia.dz/course/view.php?id=20011"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn parse_applies_field_defaults() {
        let config = sample();
        assert_eq!(config.monitor.max_concurrent, 2);
        assert_eq!(config.monitor.max_report_lines, 50);
        assert_eq!(config.monitor.schedule, "*/15 * * * *");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.portal.base_url, "https://elearning.univ-bejaia.dz");
    }

    #[test]
    fn courses_resolve_ids() {
        let ids: Vec<String> = sample().courses().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["20008".to_string(), "maths".to_string()]);
    }

    #[test]
    fn validate_sample_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_no_courses() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = sample();
        config.monitor.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut config = sample();
        config.courses[1].id = Some("20008".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_s3_without_bucket() {
        let mut config = sample();
        config.storage.backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.storage.s3_bucket = Some("bucket".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_reports_bad_schedule_as_validation() {
        let mut config = sample();
        config.monitor.schedule = "0 9 * * 1".into();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn load_or_default_falls_back_when_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(tmp.path().join("config.toml"));
        assert_eq!(config.logging.level, "info");
        assert!(config.courses.is_empty());
    }

    #[test]
    fn load_or_default_falls_back_on_invalid_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[logging\nlevel = \"debug\"").unwrap();
        assert_eq!(Config::load_or_default(&path).logging.level, "info");
    }

    #[test]
    fn load_or_default_reads_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(Config::load_or_default(&path).logging.level, "debug");
    }

    #[test]
    fn overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("SCRAPE_CONCURRENCY", "0"),
            ("STORAGE_BACKEND", "S3"),
            ("S3_BUCKET", "snapshots"),
            ("TELEGRAM_CHAT_ID", "   "),
        ]);
        let mut config = sample();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.monitor.max_concurrent, 1);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3_bucket.as_deref(), Some("snapshots"));
        assert!(config.telegram.chat_id.is_none());
    }

    #[test]
    fn invalid_concurrency_override_is_ignored() {
        let mut config = sample();
        config.apply_overrides(|k| (k == "SCRAPE_CONCURRENCY").then(|| "many".to_string()));
        assert_eq!(config.monitor.max_concurrent, 2);
    }
}
