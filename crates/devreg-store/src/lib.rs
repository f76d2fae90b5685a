//! devreg-store: referential metadata store for the device registry.
//!
//! Persists addressables, device services, device profiles, commands,
//! devices, schedules, schedule events, provision watchers and device
//! reports, and keeps the references between them valid.
//!
//! # Architecture
//!
//! [`MetadataStore`] is the single entry point. It runs every operation
//! against one of two backends behind a per-store reader/writer lock:
//!
//! - the collection backend, an ordered in-process table per record kind
//!   with a name index for unique names;
//! - the document backend, which encodes records into JSON documents held by
//!   a [`DocumentSession`] (redb by default). References are written as
//!   reference records (`{"$ref": collection, "$id": key}`) instead of
//!   embedded copies.
//!
//! Name uniqueness and reference existence are checked on write. On read,
//! every reference is re-fetched so callers always see the referenced
//! record's current state. Deletes never cascade.

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StoreError::$variant(e.to_string())
    };
}

mod backend;
mod collection;
pub mod document;
mod entity;
pub mod error;
pub mod ids;
mod relations;
pub mod store;
pub mod tables;

pub use document::{DocRef, DocumentSession, RedbSession};
pub use error::{StoreError, StoreResult};
pub use ids::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use store::MetadataStore;
