//! Search provider adapters
//!
//! Each adapter turns one third-party search API into a stream of
//! [`TrackCandidate`]s with a composite id and a best-quality asset link.

pub mod jamendo;
pub mod jiosaavn;

pub use jamendo::JamendoClient;
pub use jiosaavn::JioSaavnClient;

use crate::error::ProviderError;
use crate::types::TrackCandidate;
use serde_json::Value;
use std::time::Duration;

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const USER_AGENT: &str = concat!("firefly-ingest/", env!("CARGO_PKG_VERSION"));

/// A search provider adapter
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging and provenance
    fn name(&self) -> &'static str;

    /// Search tracks matching `query`; pages are 1-based
    async fn search(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError>;
}

/// Unescape the HTML entities providers leave in text fields
pub(crate) fn unescape_entities(text: &str) -> String {
    text.replace("&quot;", "\"").replace("&amp;", "&")
}

/// Coerce a JSON string-or-number field into text
pub(crate) fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Coerce a JSON string-or-number field into an integer, defaulting 0
pub(crate) fn value_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|v| v as i64).unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}
