//! Multi-provider search with fallback
//!
//! Queries the primary provider and degrades to the secondary provider on
//! emptiness or failure. Desi-forced queries intentionally skip the
//! generic fallback: their results would be off-topic. The aggregator
//! never raises; absence of results is the only failure signal exposed.

use crate::sources::SearchProvider;
use crate::types::TrackCandidate;
use std::sync::Arc;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

pub struct SearchAggregator {
    primary: Arc<dyn SearchProvider>,
    secondary: Arc<dyn SearchProvider>,
    limit: u32,
}

impl SearchAggregator {
    pub fn new(
        primary: Arc<dyn SearchProvider>,
        secondary: Arc<dyn SearchProvider>,
        limit: u32,
    ) -> Self {
        Self {
            primary,
            secondary,
            limit,
        }
    }

    /// Search page 1 with the configured page size
    pub async fn search(&self, query: &str, force_desi: bool) -> Vec<TrackCandidate> {
        self.search_page(query, force_desi, 1).await
    }

    /// Search one result page
    ///
    /// Fallback matrix:
    /// - primary ok but empty on page 1: secondary, unless `force_desi`
    /// - primary error: secondary, unless `force_desi` or `page > 1`
    /// - secondary error: empty
    pub async fn search_page(
        &self,
        query: &str,
        force_desi: bool,
        page: u32,
    ) -> Vec<TrackCandidate> {
        match self.primary.search(query, page, self.limit).await {
            Ok(results) if results.is_empty() && page == 1 => {
                if force_desi {
                    return Vec::new();
                }
                self.fallback(query).await
            }
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    query = %query,
                    error = %error,
                    "Primary search failed"
                );
                if force_desi || page > 1 {
                    return Vec::new();
                }
                self.fallback(query).await
            }
        }
    }

    async fn fallback(&self, query: &str) -> Vec<TrackCandidate> {
        match self.secondary.search(query, 1, self.limit).await {
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(
                    provider = self.secondary.name(),
                    query = %query,
                    error = %error,
                    "Fallback search failed"
                );
                Vec::new()
            }
        }
    }
}
