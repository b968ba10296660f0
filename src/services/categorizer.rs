//! Rule-based category tagging
//!
//! Maps a track plus hint tags to a deduplicated set of normalized
//! category tokens: language tags, desi-specific buckets, per-genre tags
//! and caller-supplied extras.

use crate::types::TrackCandidate;
use std::collections::BTreeSet;

const DESI_LANGS: &[&str] = &[
    "hindi",
    "urdu",
    "punjabi",
    "tamil",
    "telugu",
    "bengali",
    "marathi",
    "gujarati",
    "kannada",
    "malayalam",
];

const MAX_CATEGORY_LEN: usize = 60;

/// Lowercase, non-alphanumeric runs to underscores, trim underscores,
/// truncate to 60 characters
pub fn normalize_category(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_sep = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out.truncate(MAX_CATEGORY_LEN);
    out
}

/// Normalize a language value against a fixed code table
///
/// Unknown codes pass through with non-alphanumerics stripped.
pub fn normalize_language(value: &str) -> String {
    let raw = value.trim().to_lowercase();
    if raw.is_empty() {
        return String::new();
    }
    match raw.as_str() {
        "hi" | "hin" => "hindi".to_string(),
        "en" | "eng" => "english".to_string(),
        "pa" | "pun" => "punjabi".to_string(),
        "ur" => "urdu".to_string(),
        "ta" => "tamil".to_string(),
        "te" => "telugu".to_string(),
        "bn" => "bengali".to_string(),
        "mr" => "marathi".to_string(),
        "gu" => "gujarati".to_string(),
        "kn" => "kannada".to_string(),
        "ml" => "malayalam".to_string(),
        _ => raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect(),
    }
}

fn split_genres(value: &str) -> Vec<&str> {
    value
        .split(|c| matches!(c, ',' | '&' | '/' | '|'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Classify a track into category tags
///
/// `extra_categories` are caller hints (e.g. from the configured query or
/// the dataset genre column); each is re-normalized before inclusion.
pub fn classify(track: &TrackCandidate, extra_categories: &[String]) -> Vec<String> {
    let mut categories = BTreeSet::new();

    let lang = normalize_language(&track.language);
    let text = format!(
        "{} {} {} {} {}",
        track.name, track.artist, track.album, track.genre, track.tags
    )
    .to_lowercase();

    if !lang.is_empty() {
        categories.insert(format!("language_{}", normalize_category(&lang)));
    }

    if lang == "hindi" {
        categories.insert("indian_hindi".to_string());
        if text.contains("bollywood") || text.contains("movie") || text.contains("film") {
            categories.insert("hindi_bollywood".to_string());
        }
    }

    let desi = DESI_LANGS.contains(&lang.as_str())
        || text.contains("desi")
        || text.contains("indian");
    if desi && (text.contains("rap") || text.contains("hip hop")) {
        categories.insert("indian_rap".to_string());
    }

    for genre in split_genres(&track.genre) {
        let key = normalize_category(genre);
        if !key.is_empty() {
            categories.insert(format!("genre_{key}"));
        }
    }

    for extra in extra_categories {
        let key = normalize_category(extra);
        if !key.is_empty() {
            categories.insert(key);
        }
    }

    categories.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, language: &str, genre: &str, tags: &str) -> TrackCandidate {
        TrackCandidate {
            name: name.to_string(),
            language: language.to_string(),
            genre: genre.to_string(),
            tags: tags.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn normalize_category_rules() {
        assert_eq!(normalize_category("Hip-Hop & Rap!"), "hip_hop_rap");
        assert_eq!(normalize_category("  __Lo-Fi__  "), "lo_fi");
        assert_eq!(normalize_category(""), "");
        let long = "x".repeat(100);
        assert_eq!(normalize_category(&long).len(), 60);
    }

    #[test]
    fn language_codes_map_through_fixed_table() {
        assert_eq!(normalize_language("hi"), "hindi");
        assert_eq!(normalize_language("EN"), "english");
        assert_eq!(normalize_language("pa"), "punjabi");
        assert_eq!(normalize_language("bhojpuri!"), "bhojpuri");
        assert_eq!(normalize_language(""), "");
    }

    #[test]
    fn hindi_bollywood_classification() {
        let t = track("Kabhi Khushi Kabhie Gham", "hi", "", "bollywood");
        let tags = classify(&t, &[]);
        for expected in ["language_hindi", "indian_hindi", "hindi_bollywood"] {
            assert!(tags.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn indian_rap_from_desi_language_or_free_text() {
        let t = track("Wakhra Swag", "punjabi", "rap", "");
        assert!(classify(&t, &[]).contains(&"indian_rap".to_string()));

        let t = track("Desi Hip Hop Anthem", "", "", "");
        assert!(classify(&t, &[]).contains(&"indian_rap".to_string()));

        // Rap marker alone is not enough without a desi signal
        let t = track("Generic Rap Song", "en", "", "");
        assert!(!classify(&t, &[]).contains(&"indian_rap".to_string()));
    }

    #[test]
    fn genre_tags_split_on_delimiters() {
        let t = track("Song", "", "Pop, Rock & Indie/Folk|Jazz", "");
        let tags = classify(&t, &[]);
        for expected in [
            "genre_pop",
            "genre_rock",
            "genre_indie",
            "genre_folk",
            "genre_jazz",
        ] {
            assert!(tags.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn extras_are_renormalized_and_deduplicated() {
        let t = track("Song", "hi", "", "");
        let tags = classify(
            &t,
            &[
                "Indian Hindi".to_string(),
                "indian_hindi".to_string(),
                "  ".to_string(),
            ],
        );
        assert_eq!(
            tags.iter().filter(|t| t.as_str() == "indian_hindi").count(),
            1
        );
    }
}
