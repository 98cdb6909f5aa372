// Sensorlog collector
// Decision: One long-lived subscription feeds the ingestion pipeline until ctrl-c;
// store faults are logged per message and never stop the process.

use anyhow::{Context, Result};
use clap::Parser;
use sensorlog_collector::{CollectorConfig, IngestionPipeline, MqttSource};
use sensorlog_storage::{create_db_event_store, Database};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorlog_collector=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CollectorConfig::parse();
    tracing::info!(
        broker = %config.broker,
        client_id = %config.client_id,
        topic = %config.topic,
        "sensorlog-collector starting..."
    );

    let db = Database::from_url(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db.ensure_schema()
        .await
        .context("Failed to prepare database schema")?;
    tracing::info!("Connected to database");

    let pipeline = IngestionPipeline::new(Arc::new(create_db_event_store(db)))
        .with_write_timeout(config.store_timeout());

    let source = MqttSource::connect(&config).await?;
    source.subscribe().await?;

    tracing::info!("Waiting for messages. To exit press CTRL+C");
    source
        .run(pipeline, &config, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Collector shutdown complete");
    Ok(())
}
