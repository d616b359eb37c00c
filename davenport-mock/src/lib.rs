//! Test doubles for the davenport driver contracts.
//!
//! This crate provides configurable mock implementations of every contract in
//! `davenport-driver`, used to validate that consumers of the driver layer
//! handle the full protocol surface: iterator termination, row-level errors,
//! capability probing, and cancellation.
//!
//! - [`MockDatabase`] - An in-memory backend whose optional capability set is
//!   assembled explicitly through its builder
//! - [`MockRows`] - A fixture-backed result iterator with optional side channels
//!   and fault injection
//! - [`MockChanges`] - A change feed driven by a channel, supporting both
//!   finite fixtures and live feeds that block until fed or closed
//! - [`MockReplication`] - A replication handle with scriptable fields
//!
//! # Quick Start
//!
//! ```ignore
//! use davenport_mock::MockDatabase;
//! use davenport_driver::{db::Database, options::Options};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = MockDatabase::builder("testdb").with_bulk_get().build();
//!
//!     let (id, rev) = db
//!         .create_doc(serde_json::json!({"name": "alice"}), Options::new())
//!         .await?;
//!     println!("created {id} at {rev}");
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as davenport_mock;

pub mod changes;
pub mod database;
pub mod replication;
pub mod rows;

pub use changes::{MockChanges, MockChangesBuilder};
pub use database::{MockDatabase, MockDatabaseBuilder};
pub use replication::{MockReplication, MockReplicationBuilder};
pub use rows::{MockRows, MockRowsBuilder};
