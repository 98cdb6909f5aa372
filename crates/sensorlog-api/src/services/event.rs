// Event partition queries
//
// Both operations normalize the request against the current time before
// hitting the store, so a missing window means "the last day".

use sensorlog_core::{
    Clock, EventQuery, EventStore, EventTimestamp, QueryRequest, Result, SystemClock,
};
use std::sync::Arc;

pub struct EventService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn normalize(&self, request: &QueryRequest) -> EventQuery {
        request.normalize(self.clock.now())
    }

    /// Timestamps of the device's events inside the requested window
    pub async fn search(
        &self,
        device_id: &str,
        request: &QueryRequest,
    ) -> Result<Vec<EventTimestamp>> {
        let query = self.normalize(request);
        tracing::debug!(
            device_id = %device_id,
            start = %query.start,
            end = %query.end,
            skip = query.skip,
            limit = query.limit,
            "Searching events"
        );
        self.store.range_query(device_id, &query).await
    }

    /// Number of the device's events inside the requested window
    pub async fn count(&self, device_id: &str, request: &QueryRequest) -> Result<u64> {
        let query = self.normalize(request);
        self.store.count_range(device_id, &query).await
    }
}
