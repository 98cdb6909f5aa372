// MQTT message source
//
// Connects to the broker with a bounded handshake, subscribes to the device
// topic filter, and hands every publish to the ingestion pipeline in its own
// task. A semaphore bounds how many messages are being written at once; the
// permit is taken inside the task so the event loop keeps polling while the
// store is busy.

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CollectorConfig;
use crate::pipeline::{IngestOutcome, IngestionPipeline};

/// Pause before polling again after an event loop error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the client request channel
const REQUEST_CHANNEL_CAPACITY: usize = 100;

/// Hands delivered messages to the pipeline with bounded concurrency
#[derive(Clone)]
pub struct PublishDispatcher {
    pipeline: IngestionPipeline,
    in_flight: Arc<Semaphore>,
}

impl PublishDispatcher {
    pub fn new(pipeline: IngestionPipeline, max_in_flight: usize) -> Self {
        Self {
            pipeline,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Spawn the handling of one message and return immediately.
    ///
    /// The task waits for an in-flight permit before touching the store.
    /// `None` means the limiter was closed and the message was dropped.
    pub fn dispatch<P>(&self, topic: String, payload: P) -> JoinHandle<Option<IngestOutcome>>
    where
        P: AsRef<[u8]> + Send + 'static,
    {
        let pipeline = self.pipeline.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let _permit = match in_flight.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(topic = %topic, "In-flight limiter closed, dropping message");
                    return None;
                }
            };
            Some(pipeline.handle_message(&topic, payload.as_ref()).await)
        })
    }
}

/// Connected MQTT client plus its event loop
pub struct MqttSource {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
}

impl MqttSource {
    /// Connect to the broker and wait for the handshake.
    ///
    /// Fails if the broker refuses the connection, the connection errors, or
    /// no ConnAck arrives within the configured timeout.
    pub async fn connect(config: &CollectorConfig) -> Result<Self> {
        let (host, port) = config.broker_address()?;

        let mut options = MqttOptions::new(&config.client_id, host.clone(), port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        info!(host = %host, port, client_id = %config.client_id, "Connecting to MQTT broker");

        tokio::time::timeout(config.connect_timeout(), wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Timed out after {:?} waiting for MQTT broker {}:{}",
                    config.connect_timeout(),
                    host,
                    port
                )
            })??;

        info!(host = %host, port, "Connected to MQTT broker");

        Ok(Self {
            client,
            eventloop,
            topic: config.topic.clone(),
        })
    }

    /// Subscribe to the configured topic filter
    pub async fn subscribe(&self) -> Result<()> {
        self.client
            .subscribe(&self.topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.topic))?;
        info!(topic = %self.topic, "Subscribed to MQTT topic");
        Ok(())
    }

    /// Deliver messages to the pipeline until `shutdown` resolves
    pub async fn run<F>(
        self,
        pipeline: IngestionPipeline,
        config: &CollectorConfig,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            client,
            mut eventloop,
            topic,
        } = self;

        let dispatcher = PublishDispatcher::new(pipeline, config.max_in_flight);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, disconnecting from MQTT broker");
                    let _ = client.disconnect().await;
                    return Ok(());
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            dispatcher.dispatch(publish.topic, publish.payload);
                        }
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            // Clean session: the broker forgot our subscription
                            info!("Reconnected to MQTT broker, resubscribing");
                            if let Err(e) = client.try_subscribe(&topic, QoS::AtMostOnce) {
                                error!(topic = %topic, error = %e, "Failed to resubscribe");
                            }
                        }
                        Ok(Event::Incoming(Packet::SubAck(_))) => {
                            debug!(topic = %topic, "Subscription acknowledged");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "MQTT event loop error");
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    }
                }
            }
        }
    }
}

/// Poll until the broker accepts the connection
async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                anyhow::bail!("MQTT broker refused connection: {:?}", ack.code);
            }
            Ok(_) => {}
            Err(e) => return Err(e).context("Failed to connect to MQTT broker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sensorlog_core::{
        Device, EventQuery, EventStore, EventTimestamp, InMemoryEventStore, Result,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(id: &str) -> Vec<u8> {
        format!(r#"{{"id":"{id}","name":"Sensor {id}","type":"motion","trigger":true}}"#)
            .into_bytes()
    }

    #[tokio::test]
    async fn test_dispatch_stores_message() {
        let store = InMemoryEventStore::new();
        let dispatcher = PublishDispatcher::new(IngestionPipeline::new(Arc::new(store.clone())), 4);

        let outcome = dispatcher
            .dispatch("res/rfbridge/device/dev-1".to_string(), payload("dev-1"))
            .await
            .unwrap();

        assert!(matches!(outcome, Some(IngestOutcome::Stored { .. })));
        assert!(store.get_device("dev-1").await.unwrap().is_some());
        assert_eq!(store.partition_len("dev-1").await, 1);
    }

    #[tokio::test]
    async fn test_dispatch_drops_malformed_message() {
        let store = InMemoryEventStore::new();
        let dispatcher = PublishDispatcher::new(IngestionPipeline::new(Arc::new(store.clone())), 4);

        let outcome = dispatcher
            .dispatch("t".to_string(), b"{oops".to_vec())
            .await
            .unwrap();

        assert_eq!(outcome, Some(IngestOutcome::Rejected));
        assert!(store.partition_ids().await.is_empty());
    }

    /// Store whose registry writes for "slow" devices take a long time,
    /// tracking how many writes overlap
    struct SlowDeviceStore {
        inner: InMemoryEventStore,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowDeviceStore {
        fn new(inner: InMemoryEventStore) -> Self {
            Self {
                inner,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EventStore for SlowDeviceStore {
        async fn upsert_device(&self, device: &Device) -> Result<()> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);
            if device.id.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(20)).await;
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
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
    async fn test_in_flight_writes_are_bounded() {
        let store = Arc::new(SlowDeviceStore::new(InMemoryEventStore::new()));
        let dispatcher = PublishDispatcher::new(IngestionPipeline::new(store.clone()), 2);

        let handles: Vec<_> = (0..6)
            .map(|i| dispatcher.dispatch("t".to_string(), payload(&format!("dev-{i}"))))
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Some(IngestOutcome::Stored { .. })
            ));
        }

        assert_eq!(store.peak.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.partition_ids().await.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_store_does_not_block_dispatch() {
        let store = Arc::new(SlowDeviceStore::new(InMemoryEventStore::new()));
        let dispatcher = PublishDispatcher::new(IngestionPipeline::new(store.clone()), 1);

        // Holds the only permit for 20s
        let slow = dispatcher.dispatch("t".to_string(), payload("slow-1"));
        tokio::task::yield_now().await;

        // Returns immediately; the message waits for the permit in its own task
        let fast = dispatcher.dispatch("t".to_string(), payload("dev-2"));
        assert!(!fast.is_finished());

        assert!(matches!(
            fast.await.unwrap(),
            Some(IngestOutcome::Stored { .. })
        ));
        assert!(slow.is_finished());
        assert_eq!(store.inner.partition_len("slow-1").await, 1);
        assert_eq!(store.inner.partition_len("dev-2").await, 1);
    }
}
