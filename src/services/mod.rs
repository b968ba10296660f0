//! Ingestion pipeline services

pub mod aggregator;
pub mod categorizer;
pub mod coordinator;
pub mod fan_out;
pub mod importer;
pub mod matcher;

pub use aggregator::SearchAggregator;
pub use coordinator::{RunCoordinator, RunOutcome, TriggeredBy};
pub use importer::{BatchOutcome, BatchStatus, DatasetImporter, SourceStatus};
