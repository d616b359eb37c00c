//! Driver contracts for pluggable document-database backends.
//!
//! This crate defines the abstraction layer that lets a single client API talk to
//! interchangeable document-database backends (an HTTP engine, an in-process engine,
//! a test double) without knowing which one is in use. It provides:
//!
//! - **Result iterators** ([`row`]) - The pull-based [`Rows`](row::Rows) protocol for
//!   query results, with optional paging/diagnostic side channels
//! - **Change feeds** ([`changes`]) - The [`Changes`](changes::Changes) protocol for
//!   finite or unbounded change feeds
//! - **Backend surface** ([`db`]) - The mandatory [`Database`](db::Database) contract
//!   plus independently optional capability traits
//! - **Capability probing** ([`capabilities`]) - Runtime capability detection, cached
//!   per backend instance
//! - **Partition statistics** ([`partition`]) - Storage accounting for partitioned
//!   backends
//! - **Replication handles** ([`replication`]) - Long-lived replication task handles
//! - **Error vocabulary** ([`error`]) - The shared failure taxonomy for drivers
//! - **Per-call options** ([`options`]) - The free-form options map passed to backend
//!   operations
//!
//! # Example
//!
//! ```ignore
//! use davenport_driver::{capabilities::{Capabilities, Capability}, db::Database, options::Options};
//!
//! async fn dump_ids(db: &dyn Database) -> davenport_driver::error::Result<()> {
//!     let caps = Capabilities::probe(db)?;
//!     assert!(!caps.supports(Capability::BulkGet) || db.bulk_getter().is_some());
//!
//!     let rows = db.all_docs(Options::new()).await?;
//!     while let Some(row) = rows.next().await? {
//!         println!("{}", row.id);
//!     }
//!     rows.close().await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as davenport_driver;

pub mod capabilities;
pub mod changes;
pub mod db;
pub mod document;
pub mod error;
pub mod options;
pub mod partition;
pub mod replication;
pub mod row;
