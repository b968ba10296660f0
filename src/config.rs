//! Configuration for firefly-ingest
//!
//! All knobs resolve from environment variables with service defaults.
//! The pipeline itself only sees plain integers and paths; resolution
//! happens once at startup.

use std::path::PathBuf;
use std::time::Duration;

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_string(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Dataset import configuration
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Local path of the tabular dataset file (empty = dataset import disabled)
    pub path: Option<PathBuf>,
    /// Remote URL the dataset is fetched from when the local file is absent
    pub url: Option<String>,
    /// Rows scanned per batch
    pub batch_size: usize,
    /// Checkpoint the cursor every N processed rows
    pub checkpoint_every: usize,
}

impl DatasetConfig {
    pub fn from_env() -> Self {
        Self {
            path: env_string("FIREFLY_DATASET_PATH").map(PathBuf::from),
            url: env_string("FIREFLY_DATASET_URL"),
            batch_size: env_parse("FIREFLY_DATASET_BATCH_SIZE", 30),
            checkpoint_every: env_parse("FIREFLY_DATASET_CHECKPOINT_EVERY", 5usize),
        }
        .normalized()
    }

    /// Clamp knobs that must never reach zero
    fn normalized(mut self) -> Self {
        self.checkpoint_every = self.checkpoint_every.max(1);
        self
    }
}

/// Run scheduling configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Minutes between unattended runs
    pub interval_minutes: u64,
    /// Cap on catalog entries added by the query-driven stage of one run
    pub max_items_per_run: usize,
    /// Fan-out bound for candidate dedup/persist
    pub fetch_concurrency: usize,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self {
            interval_minutes: env_parse("FIREFLY_RUN_INTERVAL_MINUTES", 360),
            max_items_per_run: env_parse("FIREFLY_MAX_ITEMS_PER_RUN", 50),
            fetch_concurrency: env_parse("FIREFLY_FETCH_CONCURRENCY", 2usize),
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// Search provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub jiosaavn_base: String,
    pub jamendo_base: String,
    /// Jamendo is skipped entirely when no client id is configured
    pub jamendo_client_id: Option<String>,
    /// Results requested per search page
    pub search_limit: u32,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            jiosaavn_base: env_string("FIREFLY_JIOSAAVN_API")
                .unwrap_or_else(|| "https://jiosaavn-api-privatecvc2.vercel.app".to_string()),
            jamendo_base: env_string("FIREFLY_JAMENDO_API")
                .unwrap_or_else(|| "https://api.jamendo.com/v3.0".to_string()),
            jamendo_client_id: env_string("FIREFLY_JAMENDO_CLIENT_ID"),
            search_limit: env_parse("FIREFLY_SEARCH_LIMIT", 20),
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub dataset: DatasetConfig,
    pub run: RunConfig,
    pub providers: ProviderConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("FIREFLY_BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1:5555".to_string()),
            database_path: env_string("FIREFLY_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("firefly.db")),
            dataset: DatasetConfig::from_env(),
            run: RunConfig::from_env(),
            providers: ProviderConfig::from_env(),
        }
    }
}
