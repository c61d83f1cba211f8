//! The gix-backed implementation of [`GitRepo`].

use std::io::Write as _;
use std::path::Path;

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{
    CommitInfo, GitOid, Identity, RefEdit, RefName, TreeEdit, TreeEntry, TreeMergeOutcome,
};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Construct via [`GixRepo::init`] or [`GixRepo::open_at`].
/// Several `GixRepo` values may be open on the same repository at once;
/// they share history through the on-disk object database and refs.
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
}

impl GixRepo {
    /// Initialize a fresh non-bare repository at `path` with no commits.
    ///
    /// The directory is created if it does not exist. `identity` is written
    /// to the repository-local `user.*` config so that reflog entries have a
    /// committer no matter what the user's global config holds.
    pub fn init(path: &Path, identity: &Identity) -> Result<Self, GitError> {
        std::fs::create_dir_all(path)?;
        let repo = gix::init(path).map_err(|e| GitError::backend("init", e))?;
        let config_path = repo.git_dir().join("config");
        let mut config = std::fs::OpenOptions::new().append(true).open(&config_path)?;
        write!(
            config,
            "[user]\n\tname = {}\n\temail = {}\n",
            quote_config_value(&identity.name),
            quote_config_value(&identity.email)
        )?;
        drop(config);
        drop(repo);

        tracing::debug!(path = %path.display(), "initialized repository");
        Self::open_at(path)
    }

    /// Open a git repository at exactly `path` (no parent discovery), ignoring
    /// user and system configuration.
    pub fn open_at(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open_opts(path, gix::open::Options::isolated())
            .map_err(|e| GitError::backend("open", e))?;
        Ok(Self { repo })
    }

    /// Path of the `.git` directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.repo.git_dir()
    }

}

/// Double-quote `value` for a git config file, escaping what the parser
/// would otherwise read as syntax.
fn quote_config_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

impl GitRepo for GixRepo {
    // === Refs ===
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::read_ref(self, name)
    }

    fn delete_ref(&self, name: &RefName) -> Result<(), GitError> {
        crate::refs_impl::delete_ref(self, name)
    }

    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError> {
        crate::refs_impl::atomic_ref_update(self, edits)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
        crate::refs_impl::list_refs(self, prefix)
    }

    // === Object read ===
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
        crate::objects_impl::read_blob(self, oid)
    }

    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        crate::objects_impl::read_tree(self, oid)
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        crate::objects_impl::read_commit(self, oid)
    }

    // === Object write ===
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError> {
        crate::objects_impl::write_blob(self, data)
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
        crate::objects_impl::write_tree(self, entries)
    }

    fn edit_tree(&self, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError> {
        crate::objects_impl::edit_tree(self, base, edits)
    }

    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        identity: &Identity,
    ) -> Result<GitOid, GitError> {
        crate::objects_impl::create_commit(self, tree, parents, message, identity)
    }

    // === Ancestry ===
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
        crate::refs_impl::is_ancestor(self, ancestor, descendant)
    }

    fn merge_base(&self, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::merge_base(self, a, b)
    }

    // === Merge ===
    fn merge_trees(
        &self,
        base: GitOid,
        ours: GitOid,
        theirs: GitOid,
    ) -> Result<TreeMergeOutcome, GitError> {
        crate::merge_impl::merge_trees(self, base, ours, theirs)
    }
}
