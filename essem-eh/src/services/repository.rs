//! Media repository client
//!
//! HTTP client for the external metadata repository. Authenticates with a
//! password-grant OAuth token, cached and refreshed once when the
//! repository answers 401. Lookups return a three-way [`LookupResult`]:
//! "not found" is an expected business condition, distinct from transient
//! failure.

use async_trait::async_trait;
use essem_common::config::RepositoryConfig;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("essem/", env!("CARGO_PKG_VERSION"));
const REPOSITORY_MEDIA_TYPE: &str = "application/vnd.repository.v2+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Repository client errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("repository error {0}: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Record type as reported by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// A genuine media essence
    Essence,
    /// A browse/proxy representation of an essence
    Proxy,
    /// A stub record awaiting ingest
    Placeholder,
    /// Forward compatibility with types this worker does not know
    #[serde(other)]
    Unknown,
}

/// Record lifecycle status as reported by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Deleted,
    #[serde(other)]
    Unknown,
}

/// An essence record as returned by the repository search
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EssenceRecord {
    #[serde(rename = "ObjectId")]
    pub object_id: String,
    #[serde(rename = "MediaId")]
    pub media_id: Option<String>,
    #[serde(rename = "Type")]
    pub record_type: RecordType,
    #[serde(rename = "Status")]
    pub status: RecordStatus,
}

impl EssenceRecord {
    /// Whether this record qualifies for the get-metadata cascade.
    ///
    /// Only an active, genuine essence does; proxy, placeholder, deleted,
    /// and unrecognized records are business no-ops.
    pub fn qualifies(&self) -> bool {
        self.record_type == RecordType::Essence && self.status == RecordStatus::Active
    }
}

/// Outcome of a repository lookup
///
/// Consumed only by the decision logic.
#[derive(Debug, Clone)]
pub enum LookupResult {
    Found(EssenceRecord),
    NotFound,
    LookupFailed(String),
}

/// Lookup seam between the decision logic and the repository.
///
/// Production uses [`RepositoryClient`]; tests inject fakes.
#[async_trait]
pub trait EssenceLookup: Send + Sync {
    async fn lookup(&self, object_id: &str) -> LookupResult;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "TotalNrOfResults")]
    total_nr_of_results: u64,
    #[serde(rename = "Results", default)]
    results: Vec<EssenceRecord>,
}

/// Media repository HTTP client
pub struct RepositoryClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl RepositoryClient {
    pub fn new(config: &RepositoryConfig) -> Result<Self, RepositoryError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: Mutex::new(None),
        })
    }

    /// Fetch a fresh OAuth token via the password grant.
    async fn fetch_token(&self) -> Result<String, RepositoryError> {
        let url = format!("{}/oauth/access_token", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("grant_type", "password")])
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RepositoryError::Auth(format!(
                "token request returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Parse(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Return the cached token, fetching a fresh one when absent or when a
    /// refresh is forced after a 401.
    async fn bearer_token(&self, refresh: bool) -> Result<String, RepositoryError> {
        let mut cached = self.token.lock().await;
        if !refresh {
            if let Some(token) = cached.as_ref() {
                return Ok(token.clone());
            }
        }
        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Query the repository for the essence record with the given object id.
    ///
    /// `Ok(None)` means the repository answered but knows no such object.
    async fn get_record(&self, object_id: &str) -> Result<Option<EssenceRecord>, RepositoryError> {
        let url = format!("{}/media/", self.base_url);
        let mut refreshed = false;

        loop {
            let token = self.bearer_token(refreshed).await?;
            let query = format!("+(ObjectId:\"{}\")", object_id);

            tracing::debug!(object_id = %object_id, "Querying media repository");

            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .header(ACCEPT, REPOSITORY_MEDIA_TYPE)
                .query(&[("q", query.as_str()), ("nrOfResults", "1")])
                .send()
                .await
                .map_err(|e| RepositoryError::Network(e.to_string()))?;

            // A stale token gets one refresh, then the request is retried once.
            if response.status() == StatusCode::UNAUTHORIZED && !refreshed {
                refreshed = true;
                continue;
            }

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(RepositoryError::Api(status, body));
            }

            let search: SearchResponse = response
                .json()
                .await
                .map_err(|e| RepositoryError::Parse(e.to_string()))?;

            if search.total_nr_of_results == 0 {
                return Ok(None);
            }
            return Ok(search.results.into_iter().next());
        }
    }
}

#[async_trait]
impl EssenceLookup for RepositoryClient {
    async fn lookup(&self, object_id: &str) -> LookupResult {
        match self.get_record(object_id).await {
            Ok(Some(record)) => LookupResult::Found(record),
            Ok(None) => LookupResult::NotFound,
            Err(e) => LookupResult::LookupFailed(e.to_string()),
        }
    }
}
