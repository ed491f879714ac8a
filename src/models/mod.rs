// src/models/mod.rs

//! Domain models for the course watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod course;
mod item;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, LoggingConfig, MonitorConfig, PortalConfig, StorageBackend, StorageConfig,
    TelegramConfig,
};
pub use course::{Course, CourseEntry};
pub use item::{Item, ItemKind, RawRow};
pub use snapshot::{ChangeDetail, ChangeType, CourseSnapshot};
