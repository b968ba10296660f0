//! Core data types for the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric audio feature vector carried over from dataset rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub key: i64,
    pub loudness: f64,
    pub mode: i64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i64,
}

/// Provenance of a catalog entry that originated from the dataset file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOrigin {
    pub track_id: String,
    pub source: String,
}

/// A playable track surfaced by a search provider
///
/// `id` is the composite dedup key (`<source-prefix>_<provider id>`); it is
/// never reused across distinct provider tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackCandidate {
    pub id: String,
    pub source: String,
    pub source_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub language: String,
    pub genre: String,
    pub track_type: String,
    pub tags: String,
    pub duration: i64,
    pub audio_url: String,
    pub image_url: String,
    pub popularity: Option<i64>,
    pub explicit: Option<bool>,
    pub features: Option<AudioFeatures>,
    pub dataset: Option<DatasetOrigin>,
}

impl TrackCandidate {
    /// True when the candidate carries a playable asset reference
    pub fn has_audio(&self) -> bool {
        !self.audio_url.is_empty()
    }
}

/// One raw dataset row mapped into track terms
///
/// Numeric fields parse permissively (unparseable values become 0);
/// `explicit` is true only for a fixed token set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetTrackDescriptor {
    pub dataset_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub popularity: i64,
    pub explicit: bool,
    pub duration_seconds: i64,
    pub features: AudioFeatures,
}

fn field<'a>(row: &'a HashMap<String, String>, names: &[&str]) -> &'a str {
    names
        .iter()
        .find_map(|name| row.get(*name).map(String::as_str))
        .unwrap_or("")
}

fn parse_i64(value: &str) -> i64 {
    value.trim().parse::<f64>().map(|v| v as i64).unwrap_or(0)
}

fn parse_f64(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl DatasetTrackDescriptor {
    /// Map a raw header-keyed row into a descriptor
    ///
    /// Header aliases follow the common tabular dumps: `track_id`/`id`,
    /// `track_name`/`name`, `artists`/`artist`, `album_name`/`album`,
    /// `track_genre`/`genre`. Duration arrives in milliseconds.
    pub fn from_row(row: &HashMap<String, String>) -> Self {
        let duration_ms = parse_i64(field(row, &["duration_ms", "durationMs", "duration"]));
        let duration_seconds = if duration_ms > 0 {
            (duration_ms as f64 / 1000.0).round() as i64
        } else {
            0
        };

        Self {
            dataset_id: field(row, &["track_id", "id"]).to_string(),
            name: field(row, &["track_name", "name"]).to_string(),
            artist: field(row, &["artists", "artist"]).to_string(),
            album: field(row, &["album_name", "album"]).to_string(),
            genre: field(row, &["track_genre", "genre"]).to_string(),
            popularity: parse_i64(field(row, &["popularity"])),
            explicit: parse_flag(field(row, &["explicit"])),
            duration_seconds,
            features: AudioFeatures {
                danceability: parse_f64(field(row, &["danceability"])),
                energy: parse_f64(field(row, &["energy"])),
                key: parse_i64(field(row, &["key"])),
                loudness: parse_f64(field(row, &["loudness"])),
                mode: parse_i64(field(row, &["mode"])),
                speechiness: parse_f64(field(row, &["speechiness"])),
                acousticness: parse_f64(field(row, &["acousticness"])),
                instrumentalness: parse_f64(field(row, &["instrumentalness"])),
                liveness: parse_f64(field(row, &["liveness"])),
                valence: parse_f64(field(row, &["valence"])),
                tempo: parse_f64(field(row, &["tempo"])),
                time_signature: parse_i64(field(row, &["time_signature"])),
            },
        }
    }

    /// Search query text for this row; empty when the row names nothing
    pub fn build_query(&self) -> String {
        format!("{} {}", self.name, self.artist).trim().to_string()
    }

    /// Merge descriptor fields over a matched candidate
    ///
    /// Descriptor fields take precedence; empty descriptor text falls back
    /// to the candidate's value. Popularity/explicit/features always come
    /// from the dataset row.
    pub fn merge_into(&self, candidate: &TrackCandidate) -> TrackCandidate {
        let mut merged = candidate.clone();
        if !self.name.is_empty() {
            merged.name = self.name.clone();
        }
        if !self.artist.is_empty() {
            merged.artist = self.artist.clone();
        }
        if !self.album.is_empty() {
            merged.album = self.album.clone();
        }
        if !self.genre.is_empty() {
            merged.genre = self.genre.clone();
        }
        if self.duration_seconds > 0 {
            merged.duration = self.duration_seconds;
        }
        merged.popularity = Some(self.popularity);
        merged.explicit = Some(self.explicit);
        merged.features = Some(self.features.clone());
        merged.dataset = Some(DatasetOrigin {
            track_id: self.dataset_id.clone(),
            source: "csv".to_string(),
        });
        merged
    }
}

/// A configured catalog search query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default, rename = "forceDesi")]
    pub force_desi: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Built-in queries used when none are configured
pub fn default_queries() -> Vec<SearchQuery> {
    vec![
        SearchQuery {
            query: "indian rap latest".to_string(),
            force_desi: true,
            categories: vec!["indian_rap".to_string()],
        },
        SearchQuery {
            query: "hindi bollywood hits".to_string(),
            force_desi: true,
            categories: vec!["hindi_bollywood".to_string(), "indian_hindi".to_string()],
        },
        SearchQuery {
            query: "hindi songs latest".to_string(),
            force_desi: true,
            categories: vec!["indian_hindi".to_string()],
        },
        SearchQuery {
            query: "punjabi hits latest".to_string(),
            force_desi: true,
            categories: vec!["punjabi".to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn maps_row_with_aliases_and_permissive_numerics() {
        let descriptor = DatasetTrackDescriptor::from_row(&row(&[
            ("track_id", "abc123"),
            ("track_name", "Chaiyya Chaiyya"),
            ("artists", "Sukhwinder Singh"),
            ("album_name", "Dil Se"),
            ("track_genre", "bollywood"),
            ("duration_ms", "412000"),
            ("popularity", "not-a-number"),
            ("explicit", "True"),
            ("tempo", "96.2"),
        ]));

        assert_eq!(descriptor.dataset_id, "abc123");
        assert_eq!(descriptor.duration_seconds, 412);
        assert_eq!(descriptor.popularity, 0);
        assert!(descriptor.explicit);
        assert_eq!(descriptor.features.tempo, 96.2);
    }

    #[test]
    fn explicit_true_only_for_fixed_tokens() {
        for token in ["true", "1", "yes", "TRUE"] {
            assert!(parse_flag(token), "{token} should parse true");
        }
        for token in ["", "0", "no", "y", "explicit"] {
            assert!(!parse_flag(token), "{token} should parse false");
        }
    }

    #[test]
    fn empty_row_builds_empty_query() {
        let descriptor = DatasetTrackDescriptor::default();
        assert_eq!(descriptor.build_query(), "");
    }

    #[test]
    fn merge_prefers_dataset_fields_but_keeps_candidate_gaps() {
        let candidate = TrackCandidate {
            id: "jio_1".to_string(),
            name: "Chaiyya Chaiyya (From \"Dil Se\")".to_string(),
            artist: "Sukhwinder Singh".to_string(),
            album: "Dil Se (OST)".to_string(),
            genre: "filmi".to_string(),
            duration: 420,
            audio_url: "https://cdn.example/a.mp4".to_string(),
            ..Default::default()
        };
        let descriptor = DatasetTrackDescriptor {
            name: "Chaiyya Chaiyya".to_string(),
            album: String::new(),
            duration_seconds: 0,
            popularity: 61,
            ..Default::default()
        };

        let merged = descriptor.merge_into(&candidate);
        assert_eq!(merged.name, "Chaiyya Chaiyya");
        assert_eq!(merged.album, "Dil Se (OST)");
        assert_eq!(merged.duration, 420);
        assert_eq!(merged.popularity, Some(61));
        assert_eq!(merged.explicit, Some(false));
        assert_eq!(merged.dataset.unwrap().source, "csv");
    }
}
