//! Versioned object store for confvault.
//!
//! This crate defines the [`GitRepo`] trait, the only interface through which
//! the configuration store touches git history, and [`GixRepo`], its
//! gix-backed implementation. Commits are the history points, refs are the
//! branches, and `merge_trees` supplies three-way conflict detection over
//! file content.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`TreeEntry`], [`TreeMergeOutcome`], etc.).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod repo;
pub mod types;

// gix-backed implementation modules
mod convert;
mod gix_repo;
mod merge_impl;
mod objects_impl;
mod refs_impl;

pub use gix_repo::GixRepo;

pub use error::GitError;
pub use repo::GitRepo;
pub use types::{
    CommitInfo, EntryMode, GitOid, Identity, OidParseError, RefEdit, RefName, RefNameError,
    TreeEdit, TreeEntry, TreeMergeOutcome,
};
