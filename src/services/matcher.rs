//! Fuzzy matching between dataset rows and provider search results
//!
//! Scoring is deliberately coarse: +2 for name containment either way,
//! +2 for artist, +1 for album (candidate contains target). Maximum 5.

use crate::types::{DatasetTrackDescriptor, TrackCandidate};

/// Lowercase, collapse non-alphanumeric runs to single spaces, trim
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Score a candidate against a dataset descriptor (0..=5)
pub fn score(candidate: &TrackCandidate, target: &DatasetTrackDescriptor) -> u32 {
    let target_name = normalize(&target.name);
    let target_artist = normalize(&target.artist);
    let target_album = normalize(&target.album);

    let candidate_name = normalize(&candidate.name);
    let candidate_artist = normalize(&candidate.artist);
    let candidate_album = normalize(&candidate.album);

    let mut score = 0;
    if !target_name.is_empty()
        && (candidate_name.contains(&target_name) || target_name.contains(&candidate_name))
    {
        score += 2;
    }
    if !target_artist.is_empty()
        && (candidate_artist.contains(&target_artist) || target_artist.contains(&candidate_artist))
    {
        score += 2;
    }
    if !target_album.is_empty() && candidate_album.contains(&target_album) {
        score += 1;
    }
    score
}

/// Highest-scoring candidate, first occurrence winning ties
pub fn pick_best<'a>(
    candidates: &'a [TrackCandidate],
    target: &DatasetTrackDescriptor,
) -> Option<&'a TrackCandidate> {
    let mut best: Option<(&TrackCandidate, u32)> = None;
    for candidate in candidates {
        let candidate_score = score(candidate, target);
        match best {
            Some((_, best_score)) if candidate_score <= best_score => {}
            _ => best = Some((candidate, candidate_score)),
        }
    }
    best.map(|(candidate, _)| candidate)
}
