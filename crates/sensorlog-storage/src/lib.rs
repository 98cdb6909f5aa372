// Postgres storage layer with sqlx
//
// This crate provides the database implementation of the core EventStore trait:
// - Database: repository methods over the devices and device_events tables
// - DbEventStore: implements EventStore on top of Database

pub mod event_store;
pub mod models;
pub mod repositories;

pub use event_store::{create_db_event_store, DbEventStore};
pub use models::*;
pub use repositories::*;
