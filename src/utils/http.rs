// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::PortalConfig;

/// Create a configured asynchronous HTTP client for the portal.
///
/// When a session cookie is configured it is sent with every request.
pub fn create_async_client(config: &PortalConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = config.session_cookie.as_deref() {
        let value = HeaderValue::from_str(cookie.trim())
            .map_err(|e| AppError::config(format!("portal.session_cookie: {e}")))?;
        headers.insert(COOKIE, value);
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Fetch a page and return the final URL after redirects with its body.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<(url::Url, String)> {
    let response = client.get(url).send().await?.error_for_status()?;
    let final_url = response.url().clone();
    let text = response.text().await?;
    Ok((final_url, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_without_cookie() {
        assert!(create_async_client(&PortalConfig::default()).is_ok());
    }

    #[test]
    fn test_client_rejects_invalid_cookie() {
        let config = PortalConfig {
            session_cookie: Some("MoodleSession=abc\ninjected".into()),
            ..PortalConfig::default()
        };
        assert!(matches!(
            create_async_client(&config),
            Err(AppError::Config(_))
        ));
    }
}
