pub mod config;
pub mod mqtt;
pub mod pipeline;

// Re-export main types
pub use config::CollectorConfig;
pub use mqtt::{MqttSource, PublishDispatcher};
pub use pipeline::{IngestOutcome, IngestionPipeline, DEFAULT_WRITE_TIMEOUT};
