//! The [`GitRepo`] trait, the boundary between the configuration store and
//! git.
//!
//! The store never touches gix directly. It needs a small surface:
//!
//! | Group        | Methods                                                    |
//! |--------------|------------------------------------------------------------|
//! | Refs         | `read_ref`, `delete_ref`, `atomic_ref_update`, `list_refs` |
//! | Object read  | `read_blob`, `read_tree`, `read_commit`                    |
//! | Object write | `write_blob`, `write_tree`, `edit_tree`, `create_commit`   |
//! | Ancestry     | `is_ancestor`, `merge_base`                                |
//! | Merge        | `merge_trees`                                              |
//!
//! The trait is object-safe so the store can hold a `Box<dyn GitRepo>`.

use crate::error::GitError;
use crate::types::{
    CommitInfo, GitOid, Identity, RefEdit, RefName, TreeEdit, TreeEntry, TreeMergeOutcome,
};

/// Object store operations used by the configuration store.
///
/// Implementations are expected to be backed by a real repository
/// ([`GixRepo`](crate::GixRepo)); no method touches a working tree.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Refs
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Delete a ref. No-op if the ref does not exist.
    fn delete_ref(&self, name: &RefName) -> Result<(), GitError>;

    /// Atomically apply a batch of compare-and-swap ref updates.
    ///
    /// All updates succeed or none do. A mismatch on any expected old value
    /// is reported as [`GitError::RefConflict`].
    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError>;

    /// List refs under a literal prefix, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError>;

    // -----------------------------------------------------------------------
    // Object read
    // -----------------------------------------------------------------------

    /// Read the raw contents of a blob.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError>;

    /// Read the entries of a tree object (one level deep).
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read a commit object's metadata.
    ///
    /// Returns [`GitError::NotFound`] if `oid` is not a commit in the object
    /// database.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    // -----------------------------------------------------------------------
    // Object write
    // -----------------------------------------------------------------------

    /// Write a blob and return its OID.
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError>;

    /// Write a tree object from a list of entries and return its OID.
    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError>;

    /// Apply edits to an existing tree and return the OID of the new tree.
    fn edit_tree(&self, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError>;

    /// Write a commit object authored and committed by `identity`.
    ///
    /// No ref is moved; callers publish the commit with a ref update.
    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        identity: &Identity,
    ) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Ancestry
    // -----------------------------------------------------------------------

    /// Check if `ancestor` is reachable from `descendant` following parent
    /// links. A commit is its own ancestor.
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError>;

    /// Find the best common ancestor of two commits, if any.
    fn merge_base(&self, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Three-way merge of `ours` and `theirs` against `base` (all trees).
    ///
    /// A clean merge writes the result tree and returns it; a conflicted
    /// merge writes nothing and reports how many conflicts remain.
    fn merge_trees(
        &self,
        base: GitOid,
        ours: GitOid,
        theirs: GitOid,
    ) -> Result<TreeMergeOutcome, GitError>;
}
