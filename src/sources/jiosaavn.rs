//! JioSaavn search adapter (primary provider)
//!
//! Asset link selection prefers the 320kbps tier, then 160kbps, then the
//! last available link; artwork prefers 500x500, then 150x150, then the
//! first entry.

use super::{build_http_client, unescape_entities, value_i64, value_string, SearchProvider};
use crate::error::ProviderError;
use crate::types::TrackCandidate;
use serde::Deserialize;
use serde_json::Value;

pub struct JioSaavnClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "primaryArtists")]
    primary_artists: ArtistField,
    #[serde(default)]
    album: Option<AlbumRef>,
    #[serde(default)]
    language: String,
    #[serde(default)]
    lang: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    genres: String,
    #[serde(default)]
    category: String,
    #[serde(default, rename = "type")]
    track_type: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    duration: Value,
    #[serde(default, rename = "downloadUrl")]
    download_url: Vec<QualityLink>,
    #[serde(default)]
    image: Vec<QualityLink>,
}

/// `primaryArtists` arrives either as display text or as a credit list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtistField {
    Text(String),
    Credits(Vec<ArtistRef>),
}

impl Default for ArtistField {
    fn default() -> Self {
        ArtistField::Text(String::new())
    }
}

impl ArtistField {
    fn display_name(&self) -> String {
        match self {
            ArtistField::Text(text) if text.is_empty() => "Unknown Artist".to_string(),
            ArtistField::Text(text) => text.clone(),
            ArtistField::Credits(credits) => credits
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct QualityLink {
    #[serde(default)]
    quality: String,
    #[serde(default)]
    link: String,
}

fn pick_link<'a>(links: &'a [QualityLink], preferred: &[&str]) -> &'a str {
    preferred
        .iter()
        .find_map(|quality| links.iter().find(|l| l.quality == *quality))
        .or_else(|| links.last())
        .map(|l| l.link.as_str())
        .unwrap_or("")
}

impl JioSaavnClient {
    pub fn new(base_url: String) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url,
            http: build_http_client()?,
        })
    }

    fn format_track(&self, track: ApiTrack) -> Option<TrackCandidate> {
        let source_id = value_string(&track.id);
        if source_id.is_empty() {
            return None;
        }

        let audio_url = pick_link(&track.download_url, &["320kbps", "160kbps"]).to_string();
        let image_url = track
            .image
            .iter()
            .find(|l| l.quality == "500x500")
            .or_else(|| track.image.iter().find(|l| l.quality == "150x150"))
            .or_else(|| track.image.first())
            .map(|l| l.link.clone())
            .unwrap_or_default();

        let name = if track.name.is_empty() {
            "Unknown".to_string()
        } else {
            track.name
        };
        // Field names vary across API deployments
        let genre = [&track.genre, &track.genres, &track.category]
            .into_iter()
            .find(|v| !v.is_empty())
            .cloned()
            .unwrap_or_default();
        let language = if !track.language.is_empty() {
            track.language.clone()
        } else {
            track.lang.clone()
        };

        Some(TrackCandidate {
            id: format!("jio_{source_id}"),
            source: "jiosaavn".to_string(),
            source_id,
            name: unescape_entities(&name),
            artist: unescape_entities(&track.primary_artists.display_name()),
            album: unescape_entities(
                track.album.as_ref().map(|a| a.name.as_str()).unwrap_or(""),
            ),
            language,
            genre,
            track_type: track.track_type,
            tags: track.tags,
            duration: value_i64(&track.duration),
            audio_url,
            image_url,
            popularity: None,
            explicit: None,
            features: None,
            dataset: None,
        })
    }
}

#[async_trait::async_trait]
impl SearchProvider for JioSaavnClient {
    fn name(&self) -> &'static str {
        "jiosaavn"
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError> {
        let url = format!("{}/search/songs", self.base_url);

        tracing::debug!(query = %query, page, "Querying JioSaavn search API");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("page", &page.to_string()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed
            .data
            .results
            .into_iter()
            .filter_map(|track| self.format_track(track))
            .collect())
    }
}
