// src/services/acquisition.rs

//! Course page acquisition.
//!
//! An [`Acquisition`] opens one [`AcquisitionSession`] per run; the session
//! fetches raw rows for individual courses and is closed when the run ends.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Course, PortalConfig, RawRow};
use crate::utils::http::{create_async_client, fetch_text};

use super::extract::PageExtractor;

/// Source of raw rows, opened once per run.
#[async_trait]
pub trait Acquisition: Send + Sync {
    /// Open a session usable for every course of one run.
    async fn open(&self) -> Result<Box<dyn AcquisitionSession>>;
}

/// A live session against the portal.
#[async_trait]
pub trait AcquisitionSession: Send + Sync {
    /// Fetch and extract the raw rows of one course page.
    async fn fetch_rows(&self, course: &Course) -> Result<Vec<RawRow>>;

    /// Release whatever the session holds.
    async fn close(&self) -> Result<()>;
}

/// Plain HTTP acquisition reusing a pre-established portal session cookie.
pub struct HttpAcquisition {
    config: PortalConfig,
    base: Url,
    extractor: Arc<PageExtractor>,
}

impl HttpAcquisition {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            config: config.clone(),
            base,
            extractor: Arc::new(PageExtractor::new()?),
        })
    }

    /// Check that the cookie still grants a signed-in session.
    async fn verify_session(&self, client: &Client) -> Result<()> {
        let dashboard = self.base.join("my/")?;
        let (final_url, html) = fetch_text(client, dashboard.as_str())
            .await
            .map_err(|e| AppError::acquisition("session", e))?;

        if self.extractor.is_login_page(&final_url, &html) || !self.extractor.is_signed_in(&html) {
            return Err(AppError::acquisition(
                "session",
                "portal session is not signed in; refresh portal.session_cookie",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Acquisition for HttpAcquisition {
    async fn open(&self) -> Result<Box<dyn AcquisitionSession>> {
        let client = create_async_client(&self.config)?;

        if self.config.session_cookie.is_some() {
            self.verify_session(&client).await?;
            log::info!("Portal session verified at {}", self.base);
        } else {
            log::info!("No portal session cookie configured; fetching anonymously");
        }

        Ok(Box::new(HttpSession {
            client,
            extractor: Arc::clone(&self.extractor),
        }))
    }
}

struct HttpSession {
    client: Client,
    extractor: Arc<PageExtractor>,
}

#[async_trait]
impl AcquisitionSession for HttpSession {
    async fn fetch_rows(&self, course: &Course) -> Result<Vec<RawRow>> {
        let (final_url, html) = fetch_text(&self.client, &course.url)
            .await
            .map_err(|e| AppError::acquisition(&course.id, e))?;

        if self.extractor.is_login_page(&final_url, &html) {
            return Err(AppError::acquisition(
                &course.id,
                format!("redirected to the login page ({final_url})"),
            ));
        }

        let rows = self.extractor.extract(&html, &final_url);
        log::debug!("Extracted {} rows from {}", rows.len(), course.url);
        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        log::debug!("Closing portal session");
        Ok(())
    }
}
