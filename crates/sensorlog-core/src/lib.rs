// Sensor Event Core
//
// This crate provides the DB-agnostic pieces shared by the collector and the API:
// the device registry and event partition model, the EventStore capability,
// time-range query parsing, and an in-memory store for tests.
//
// Key design decisions:
// - All store access goes through the EventStore trait (Postgres in production, in-memory in tests)
// - A partition is addressed by device id; how partitions are laid out is the store's concern
// - Only the arrival instant of an event is persisted
// - The clock is injectable so ingestion instants and query defaults are testable

pub mod clock;
pub mod device;
pub mod error;
pub mod event;
pub mod query;
pub mod traits;

// In-memory implementation for examples and testing
pub mod memory;

// Re-exports for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use device::Device;
pub use error::{Result, SensorError};
pub use event::{EventPayload, EventTimestamp};
pub use memory::InMemoryEventStore;
pub use query::{EventQuery, QueryRequest, BOUND_PRECISION_DIGITS, DEFAULT_WINDOW_HOURS};
pub use traits::EventStore;
