// Ingestion pipeline
//
// For every delivered message:
// 1. decode the payload as an EventPayload (drop it on failure)
// 2. upsert the device registry entry (last write wins)
// 3. insert the arrival instant into the device's partition
//
// Store failures are logged and never stop the pipeline. Both writes are
// attempted even when the first one fails or times out; each write has its
// own time budget.

use chrono::SubsecRound;
use sensorlog_core::{Clock, EventPayload, EventStore, EventTimestamp, SystemClock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info_span, warn, Instrument, Span};

/// Default upper bound on a single store write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of handling one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Registry entry and event both written
    Stored {
        device_id: String,
        at: EventTimestamp,
    },
    /// At least one of the two writes failed
    Partial {
        device_id: String,
        device_written: bool,
        event_written: bool,
    },
    /// Payload could not be decoded; nothing was written
    Rejected,
}

/// Consumes decoded telemetry and writes it to the store
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    write_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Bound each store write (registry upsert, event insert) separately
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Ingestion instant: now in UTC, at millisecond precision
    fn ingestion_instant(&self) -> EventTimestamp {
        self.clock.now().trunc_subsecs(3)
    }

    /// Run one store write under the write timeout. Failures and timeouts are
    /// logged and reported as `false`.
    async fn bounded_write<F>(&self, action: &str, device_id: &str, write: F) -> bool
    where
        F: Future<Output = sensorlog_core::Result<()>>,
    {
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(device_id = %device_id, error = %e, "Failed to {}", action);
                false
            }
            Err(_) => {
                error!(
                    device_id = %device_id,
                    timeout = ?self.write_timeout,
                    "Timed out trying to {}", action
                );
                false
            }
        }
    }

    /// Handle one `(topic, payload)` delivery. Never fails; the outcome is
    /// returned for callers that want to inspect it.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        let span = info_span!(
            parent: None,
            "ingest_message",
            topic = %topic,
            payload_size = payload.len(),
            device_id = tracing::field::Empty,
        );

        async {
            debug!(
                payload = %String::from_utf8_lossy(payload),
                "* [{}] message received", topic
            );

            let event = match EventPayload::decode_valid(payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Failed to decode event payload, dropping message");
                    return IngestOutcome::Rejected;
                }
            };

            Span::current().record("device_id", event.id.as_str());

            let device = event.device();
            let device_written = self
                .bounded_write("upsert device", &event.id, self.store.upsert_device(&device))
                .await;

            let at = self.ingestion_instant();
            let event_written = self
                .bounded_write("insert event", &event.id, self.store.insert_event(&event.id, at))
                .await;

            if device_written && event_written {
                debug!(device_id = %event.id, at = %at, "Event stored");
                IngestOutcome::Stored {
                    device_id: event.id,
                    at,
                }
            } else {
                IngestOutcome::Partial {
                    device_id: event.id,
                    device_written,
                    event_written,
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use sensorlog_core::{
        Device, EventQuery, FixedClock, InMemoryEventStore, Result, SensorError,
    };

    const HALL_SENSOR: &[u8] =
        br#"{"id":"dev-1","name":"Hall Sensor","type":"motion","trigger":true}"#;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn pipeline_at(now: DateTime<Utc>) -> (IngestionPipeline, InMemoryEventStore, FixedClock) {
        let store = InMemoryEventStore::new();
        let clock = FixedClock::new(now);
        let pipeline =
            IngestionPipeline::with_clock(Arc::new(store.clone()), Arc::new(clock.clone()));
        (pipeline, store, clock)
    }

    fn wide_window() -> EventQuery {
        EventQuery::between(
            new_year() - Duration::days(365),
            new_year() + Duration::days(365),
        )
    }

    #[tokio::test]
    async fn test_ingest_registers_device_and_event() {
        let (pipeline, store, _clock) = pipeline_at(new_year());

        let outcome = pipeline
            .handle_message("res/rfbridge/device/dev-1", HALL_SENSOR)
            .await;
        assert_eq!(
            outcome,
            IngestOutcome::Stored {
                device_id: "dev-1".into(),
                at: new_year()
            }
        );

        let device = store.get_device("dev-1").await.unwrap().unwrap();
        assert_eq!(device, Device::new("dev-1", "Hall Sensor", "motion"));

        let window = EventQuery::between(
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        );
        assert_eq!(
            store.range_query("dev-1", &window).await.unwrap(),
            vec![new_year()]
        );
        assert_eq!(store.count_range("dev-1", &window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_message_wins_for_device_metadata() {
        let (pipeline, store, clock) = pipeline_at(new_year());

        pipeline.handle_message("t", HALL_SENSOR).await;
        clock.advance(Duration::seconds(1));
        pipeline
            .handle_message(
                "t",
                br#"{"id":"dev-1","name":"Front Door","type":"contact","trigger":false}"#,
            )
            .await;

        let device = store.get_device("dev-1").await.unwrap().unwrap();
        assert_eq!(device.name, "Front Door");
        assert_eq!(device.device_type, "contact");
        assert_eq!(store.count_range("dev-1", &wide_window()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_instant_collapses_to_one_record() {
        let (pipeline, store, _clock) = pipeline_at(new_year());

        pipeline.handle_message("t", HALL_SENSOR).await;
        pipeline.handle_message("t", HALL_SENSOR).await;

        assert_eq!(store.count_range("dev-1", &wide_window()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_instant_is_truncated_to_milliseconds() {
        let now = new_year() + Duration::nanoseconds(1_234_567);
        let (pipeline, store, clock) = pipeline_at(now);

        pipeline.handle_message("t", HALL_SENSOR).await;
        // Sub-millisecond apart lands on the same key
        clock.advance(Duration::nanoseconds(100));
        pipeline.handle_message("t", HALL_SENSOR).await;

        let stored = store.range_query("dev-1", &wide_window()).await.unwrap();
        assert_eq!(stored, vec![new_year() + Duration::milliseconds(1)]);
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_block_next_message() {
        let (pipeline, store, _clock) = pipeline_at(new_year());

        assert_eq!(
            pipeline.handle_message("t", b"{garbage").await,
            IngestOutcome::Rejected
        );
        assert!(store.list_devices().await.unwrap().is_empty());

        let outcome = pipeline.handle_message("t", HALL_SENSOR).await;
        assert!(matches!(outcome, IngestOutcome::Stored { .. }));
        assert_eq!(store.list_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_device_id_is_rejected() {
        let (pipeline, store, _clock) = pipeline_at(new_year());

        let outcome = pipeline
            .handle_message("t", br#"{"id":"","name":"x","type":"y","trigger":true}"#)
            .await;
        assert_eq!(outcome, IngestOutcome::Rejected);
        assert!(store.list_devices().await.unwrap().is_empty());
        assert!(store.partition_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_only_arrival_instant_is_persisted() {
        let (pipeline, store, _clock) = pipeline_at(new_year());

        pipeline.handle_message("t", HALL_SENSOR).await;

        // The partition holds bare instants; name/type/trigger of the event are not kept
        let stored: Vec<EventTimestamp> =
            store.range_query("dev-1", &wide_window()).await.unwrap();
        assert_eq!(stored, vec![new_year()]);
    }

    /// Store whose registry writes always fail
    struct BrokenRegistry {
        inner: InMemoryEventStore,
    }

    #[async_trait]
    impl EventStore for BrokenRegistry {
        async fn upsert_device(&self, _device: &Device) -> Result<()> {
            Err(SensorError::store("registry unavailable"))
        }

        async fn list_devices(&self) -> Result<Vec<Device>> {
            self.inner.list_devices().await
        }

        async fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
            self.inner.get_device(device_id).await
        }

        async fn insert_event(&self, device_id: &str, at: EventTimestamp) -> Result<()> {
            if device_id == "poison" {
                return Err(SensorError::store("partition unavailable"));
            }
            self.inner.insert_event(device_id, at).await
        }

        async fn range_query(
            &self,
            device_id: &str,
            query: &EventQuery,
        ) -> Result<Vec<EventTimestamp>> {
            self.inner.range_query(device_id, query).await
        }

        async fn count_range(&self, device_id: &str, query: &EventQuery) -> Result<u64> {
            self.inner.count_range(device_id, query).await
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_reported_and_pipeline_continues() {
        let inner = InMemoryEventStore::new();
        let store = Arc::new(BrokenRegistry {
            inner: inner.clone(),
        });
        let pipeline =
            IngestionPipeline::with_clock(store, Arc::new(FixedClock::new(new_year())));

        // Registry write fails, event insert is still attempted
        let outcome = pipeline.handle_message("t", HALL_SENSOR).await;
        assert_eq!(
            outcome,
            IngestOutcome::Partial {
                device_id: "dev-1".into(),
                device_written: false,
                event_written: true,
            }
        );
        assert_eq!(inner.partition_len("dev-1").await, 1);

        // Both writes fail; later messages are still processed
        let outcome = pipeline
            .handle_message("t", br#"{"id":"poison","name":"p","type":"p"}"#)
            .await;
        assert_eq!(
            outcome,
            IngestOutcome::Partial {
                device_id: "poison".into(),
                device_written: false,
                event_written: false,
            }
        );

        let outcome = pipeline
            .handle_message("t", br#"{"id":"dev-2","name":"n","type":"t"}"#)
            .await;
        assert!(matches!(outcome, IngestOutcome::Partial { event_written: true, .. }));
        assert_eq!(inner.partition_len("dev-2").await, 1);
    }

    /// Store whose registry writes hang longer than the write timeout
    struct SlowRegistry {
        inner: InMemoryEventStore,
    }

    #[async_trait]
    impl EventStore for SlowRegistry {
        async fn upsert_device(&self, device: &Device) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_secs(31)).await;
            self.inner.upsert_device(device).await
        }

        async fn list_devices(&self) -> Result<Vec<Device>> {
            self.inner.list_devices().await
        }

        async fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
            self.inner.get_device(device_id).await
        }

        async fn insert_event(&self, device_id: &str, at: EventTimestamp) -> Result<()> {
            self.inner.insert_event(device_id, at).await
        }

        async fn range_query(
            &self,
            device_id: &str,
            query: &EventQuery,
        ) -> Result<Vec<EventTimestamp>> {
            self.inner.range_query(device_id, query).await
        }

        async fn count_range(&self, device_id: &str, query: &EventQuery) -> Result<u64> {
            self.inner.count_range(device_id, query).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_registry_write_does_not_skip_event_insert() {
        let inner = InMemoryEventStore::new();
        let pipeline = IngestionPipeline::with_clock(
            Arc::new(SlowRegistry {
                inner: inner.clone(),
            }),
            Arc::new(FixedClock::new(new_year())),
        )
        .with_write_timeout(std::time::Duration::from_secs(30));

        let outcome = pipeline.handle_message("t", HALL_SENSOR).await;
        assert_eq!(
            outcome,
            IngestOutcome::Partial {
                device_id: "dev-1".into(),
                device_written: false,
                event_written: true,
            }
        );
        assert_eq!(inner.partition_len("dev-1").await, 1);
        assert!(inner.get_device("dev-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_ingestion_across_devices() {
        let store = InMemoryEventStore::new();
        let pipeline = IngestionPipeline::new(Arc::new(store.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                let payload = format!(r#"{{"id":"dev-{i}","name":"n{i}","type":"motion"}}"#);
                pipeline.handle_message("t", payload.as_bytes()).await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await.unwrap(), IngestOutcome::Stored { .. }));
        }

        assert_eq!(store.list_devices().await.unwrap().len(), 8);
        assert_eq!(store.partition_ids().await.len(), 8);
    }
}
