//! confvault: a versioned configuration store with optimistic concurrency.
//!
//! A store persists one document. Readers get a [`Snapshot`]: the document
//! plus the [`VersionToken`] of the commit it came from. Writers hand back a
//! modified snapshot; the store merges it into the main line against the
//! version it was derived from, and rejects it with a conflict only when its
//! changes overlap changes made since.
//!
//! ```no_run
//! use confvault::{ConfigStore, StoreConfig};
//!
//! # fn main() -> Result<(), confvault::StoreError> {
//! let mut store = ConfigStore::create("/tmp/flags".as_ref(), StoreConfig::default())?;
//! store.overwrite(&serde_json::json!({ "enabled": false }), &confvault::JsonCodec::new())?;
//!
//! let snapshot = store.get_json_snapshot::<serde_json::Value>()?;
//! let outcome = store.upload_json_update(&snapshot.map(|mut doc| {
//!     doc["enabled"] = true.into();
//!     doc
//! }))?;
//! assert!(outcome.is_applied());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
mod reader;
pub mod snapshot;
pub mod store;
pub mod upload;

pub use codec::{BinaryCodec, CodecError, DocumentCodec, JsonCodec, TomlCodec};
pub use config::{IdentityConfig, StoreConfig};
pub use error::StoreError;
pub use snapshot::{Snapshot, VersionToken};
pub use store::{ConfigStore, HistoryEntry, MergeOutcome};
pub use upload::{ConflictReason, UploadOutcome};

pub use confvault_git;
