//! Jamendo search adapter (secondary / fallback provider)
//!
//! Requires a client id; without one, searches resolve to empty rather
//! than erroring so the aggregator can treat the fallback as absent.

use super::{build_http_client, value_i64, value_string, SearchProvider};
use crate::error::ProviderError;
use crate::types::TrackCandidate;
use serde::Deserialize;
use serde_json::Value;

pub struct JamendoClient {
    base_url: String,
    client_id: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    #[serde(default)]
    results: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    tags: Value,
    #[serde(default, rename = "type")]
    track_type: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    album_image: String,
    #[serde(default)]
    audio: String,
    #[serde(default)]
    duration: Value,
}

fn format_track(track: ApiTrack) -> Option<TrackCandidate> {
    let source_id = value_string(&track.id);
    if source_id.is_empty() {
        return None;
    }

    let image_url = if !track.image.is_empty() {
        track.image.clone()
    } else {
        track.album_image.clone()
    };

    Some(TrackCandidate {
        id: format!("jam_{source_id}"),
        source: "jamendo".to_string(),
        source_id,
        name: if track.name.is_empty() {
            "Unknown".to_string()
        } else {
            track.name
        },
        artist: if track.artist_name.is_empty() {
            "Unknown Artist".to_string()
        } else {
            track.artist_name
        },
        album: track.album_name,
        language: String::new(),
        genre: track.genre,
        track_type: track.track_type,
        tags: value_string(&track.tags),
        duration: value_i64(&track.duration),
        audio_url: track.audio,
        image_url,
        popularity: None,
        explicit: None,
        features: None,
        dataset: None,
    })
}

impl JamendoClient {
    pub fn new(base_url: String, client_id: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url,
            client_id,
            http: build_http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl SearchProvider for JamendoClient {
    fn name(&self) -> &'static str {
        "jamendo"
    }

    async fn search(
        &self,
        query: &str,
        _page: u32,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError> {
        let Some(client_id) = &self.client_id else {
            return Ok(Vec::new());
        };

        let url = format!("{}/tracks/", self.base_url);

        tracing::debug!(query = %query, "Querying Jamendo tracks API");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("client_id", client_id.as_str()),
                ("format", "json"),
                ("limit", &limit.to_string()),
                ("search", query),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        let parsed: TracksResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed.results.into_iter().filter_map(format_track).collect())
    }
}
