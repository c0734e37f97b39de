//! SeDAS REST API client
//!
//! [`SedasClient`] wraps the endpoints the bulk downloader needs:
//! - [`search`] - product search by area, time window and sensor
//! - [`archive`] - long-term archive requests and their status
//! - [`download`] - streaming product transfer to disk
//!
//! Every call carries a `Token` authorization header. The token is obtained lazily,
//! renewed shortly before it expires, and refreshed once when the server reports it
//! as invalid.

mod archive;
mod download;
mod search;


pub use search::{SearchQuery, SearchResponse, Sensor};

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result, RetrievalError};
use crate::retrieval::{Readiness, RetrievalService};
use crate::types::{ProductDescriptor, RequestHandle};

/// Message the API returns (with HTTP 400) for a token it no longer knows
const UNKNOWN_TOKEN_MESSAGE: &str = "User token does not exist";

/// Maximum number of response body characters kept in [`Error::Http`]
const MAX_ERROR_BODY: usize = 512;

/// Client for the SeDAS API
pub struct SedasClient {
    http: reqwest::Client,
    config: ClientConfig,
    base_url: Url,
    token: RwLock<Option<Token>>,
}

#[derive(Clone)]
struct Token {
    value: String,
    /// Log in again from this point on
    refresh_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "validUntil")]
    valid_until: String,
}

impl SedasClient {
    /// Create a client; no request is made until the first call
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` is not a valid URL and [`Error::Network`]
    /// if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        // No client-wide timeout: product transfers may legitimately take hours
        let http = reqwest::Client::builder()
            .user_agent(concat!("sedas-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// The API root all endpoints are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Log in, replacing any stored token
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] for blank or rejected credentials (blank credentials
    /// are rejected without contacting the server).
    pub async fn login(&self) -> Result<()> {
        let mut guard = self.token.write().await;
        *guard = Some(self.authenticate().await?);
        Ok(())
    }

    async fn authenticate(&self) -> Result<Token> {
        if self.config.username.trim().is_empty() || self.config.password.is_empty() {
            return Err(Error::Auth(
                "username and password must not be blank".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.endpoint("authentication")?)
            .timeout(self.config.timeout)
            .json(&LoginRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await?;

        // Rejected credentials must not go through the re-login path
        let status = response.status().as_u16();
        if matches!(status, 400 | 401 | 403) {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %truncate(&body), "SeDAS login rejected");
            return Err(Error::Auth(format!("login rejected with HTTP {}", status)));
        }
        let login: LoginResponse = check_status(response).await?.json().await?;

        let valid_until = parse_valid_until(&login.valid_until)?;
        let margin = chrono::Duration::from_std(self.config.token_refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());
        tracing::debug!(valid_until = %valid_until, "SeDAS login successful");

        Ok(Token {
            value: login.token,
            refresh_at: valid_until - margin,
        })
    }

    /// Current token, logging in first if there is none or it is about to expire
    async fn current_token(&self) -> Result<String> {
        if let Some(value) = usable(self.token.read().await.as_ref()) {
            return Ok(value);
        }

        let mut guard = self.token.write().await;
        // Another caller may have logged in while we waited for the lock
        if let Some(value) = usable(guard.as_ref()) {
            return Ok(value);
        }
        let token = self.authenticate().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Send an authorized request built by `build`, logging in again once if the
    /// server rejects the token
    async fn send_authorized<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        match self.send_once(&build).await {
            Err(e) if is_token_error(&e) => {
                tracing::warn!(error = %e, "SeDAS token rejected, logging in again");
                self.invalidate_token().await;
                self.send_once(&build).await
            }
            other => other,
        }
    }

    async fn send_once<F>(&self, build: &F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.current_token().await?;
        let response = build(&self.http)
            .header(AUTHORIZATION, format!("Token {token}"))
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl RetrievalService for SedasClient {
    async fn request_archive(
        &self,
        descriptor: &ProductDescriptor,
    ) -> std::result::Result<RequestHandle, RetrievalError> {
        Ok(self.request(descriptor).await?)
    }

    async fn poll_ready(
        &self,
        handle: &RequestHandle,
    ) -> std::result::Result<Readiness, RetrievalError> {
        Ok(match self.is_request_ready(handle).await? {
            Some(url) => Readiness::Ready(url),
            None => Readiness::NotYetReady,
        })
    }

    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
    ) -> std::result::Result<u64, RetrievalError> {
        Ok(self.download_to(url, destination).await?)
    }

    fn name(&self) -> &'static str {
        "sedas"
    }
}

/// Turn a non-success response into [`Error::Http`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        url,
        body: truncate(&body),
    })
}

fn usable(token: Option<&Token>) -> Option<String> {
    token
        .filter(|t| Utc::now() < t.refresh_at)
        .map(|t| t.value.clone())
}

fn is_token_error(err: &Error) -> bool {
    match err {
        Error::Http { status: 401 | 403, .. } => true,
        Error::Http {
            status: 400, body, ..
        } => body.contains(UNKNOWN_TOKEN_MESSAGE),
        _ => false,
    }
}

/// `validUntil` is UTC without an offset (`2024-01-01T12:00:00Z`); accept RFC 3339 too
fn parse_valid_until(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| Error::Auth(format!("invalid token expiry '{}': {}", value, e)))
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}
