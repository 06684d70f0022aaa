#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Reconciliation between Folio's local state and an external system of
//! record (spec §4.7).
//!
//! `Synchronizer` owns the advisory locking, conflict detection, and retry
//! queue; `EntitySource` abstracts both the local and external sides so
//! neither is wired to a concrete schema here.

pub mod conflict;
pub mod error;
pub mod external;
pub mod synchronizer;
pub mod types;

pub use conflict::{resolve, ConflictStrategy, Resolution};
pub use error::{SyncError, SyncResult};
pub use external::{EntitySource, InMemoryEntitySource};
pub use synchronizer::Synchronizer;
pub use types::{HealthStatus, SyncConfig, SyncHealth, SyncStats};
