//! The store adapter: one repository handle plus one working state.
//!
//! A [`ConfigStore`] owns exactly one checkout. Every operation that moves it
//! takes `&mut self`, so two operations on the same instance cannot
//! interleave. Writers that need real concurrency each open their own
//! instance with [`ConfigStore::attach`]; instances share history through
//! the repository and never share a working directory.
//!
//! The working state is materialized as a single file,
//! `<workdir>/<document>`, mirroring the document entry of the checked-out
//! branch tip.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use confvault_git::{
    EntryMode, GitError, GitOid, GitRepo, GixRepo, RefEdit, RefName, TreeEdit,
};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::snapshot::VersionToken;

/// The branch currently materialized in the working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Checkout {
    pub(crate) branch: RefName,
    /// Tip at checkout (or last commit) time. `None` for an unborn branch.
    pub(crate) tip: Option<GitOid>,
}

/// Result of merging a branch into the main line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The main line had not moved since the branch forked; it now points at
    /// the branch tip.
    FastForward(GitOid),
    /// A two-parent merge commit was recorded on the main line.
    Merged(GitOid),
    /// The branch was already part of the main line; nothing changed.
    UpToDate(GitOid),
    /// The three-way merge left overlapping changes. The main line is
    /// unchanged.
    Conflicted {
        /// Number of unresolved conflicts.
        conflicts: usize,
    },
    /// Another instance advanced the main line while this merge was being
    /// prepared. The main line holds that other instance's commit.
    MainLineMoved,
}

/// One commit on the main line's first-parent history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Version token of the commit.
    pub version: VersionToken,
    /// Commit message.
    pub message: String,
    /// `true` for merge commits.
    pub is_merge: bool,
}

/// A versioned configuration store.
pub struct ConfigStore {
    pub(crate) repo: Box<dyn GitRepo>,
    pub(crate) repo_path: PathBuf,
    pub(crate) workdir: PathBuf,
    pub(crate) config: StoreConfig,
    pub(crate) main: RefName,
    pub(crate) head: Checkout,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("repo_path", &self.repo_path)
            .field("workdir", &self.workdir)
            .field("main", &self.main)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Initialize a fresh store at `path` with an empty main line.
    pub fn create(path: &Path, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let repo = GixRepo::init(path, &config.identity())?;
        tracing::info!(path = %path.display(), main = %config.main_branch, "created store");
        Self::with_repo(Box::new(repo), path, path, config)
    }

    /// Open an existing store at `path`, using its own working directory.
    pub fn open(path: &Path, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let repo = GixRepo::open_at(path)?;
        Self::with_repo(Box::new(repo), path, path, config)
    }

    /// Open another instance of the store at `repo_path` that materializes its
    /// working state in `workdir`.
    ///
    /// The new instance shares history with every other instance of the same
    /// repository; its checkout is independent.
    pub fn attach(repo_path: &Path, workdir: &Path, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(workdir)?;
        let repo = GixRepo::open_at(repo_path)?;
        Self::with_repo(Box::new(repo), repo_path, workdir, config)
    }

    /// Build a store over an already-open repository handle and check out the
    /// main line.
    pub fn with_repo(
        repo: Box<dyn GitRepo>,
        repo_path: &Path,
        workdir: &Path,
        config: StoreConfig,
    ) -> Result<Self> {
        let main = config.main_ref().map_err(|e| StoreError::Config {
            path: PathBuf::new(),
            detail: e.to_string(),
        })?;
        let mut store = Self {
            repo,
            repo_path: repo_path.to_owned(),
            workdir: workdir.to_owned(),
            config,
            head: Checkout {
                branch: main.clone(),
                tip: None,
            },
            main,
        };
        let main = store.main.clone();
        store.checkout(&main)?;
        Ok(store)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The store's configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the shared repository.
    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// This instance's working directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The main line's ref.
    #[must_use]
    pub const fn main_ref(&self) -> &RefName {
        &self.main
    }

    /// The branch currently checked out.
    #[must_use]
    pub const fn checked_out(&self) -> &RefName {
        &self.head.branch
    }

    fn working_file(&self) -> PathBuf {
        self.workdir.join(&self.config.document)
    }

    // -----------------------------------------------------------------------
    // Tips and tokens
    // -----------------------------------------------------------------------

    /// The main line's current tip, or `None` before the first commit.
    pub fn current_tip(&self) -> Result<Option<VersionToken>> {
        Ok(self.main_tip()?.map(VersionToken::from_oid))
    }

    pub(crate) fn main_tip(&self) -> Result<Option<GitOid>> {
        Ok(self.repo.read_ref(&self.main)?)
    }

    /// Check that `token` names a commit in the main line's history and
    /// return it.
    pub fn resolve_token(&self, token: VersionToken) -> Result<GitOid> {
        let oid = token.oid();
        match self.repo.read_commit(oid) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(StoreError::invalid_token(token, "no such commit"));
            }
            Err(e) => return Err(e.into()),
        }
        let Some(tip) = self.main_tip()? else {
            return Err(StoreError::invalid_token(token, "the main line has no history"));
        };
        if !self.repo.is_ancestor(oid, tip)? {
            return Err(StoreError::invalid_token(
                token,
                "commit is not part of the main line's history",
            ));
        }
        Ok(oid)
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Create branch `name` at `from`. Fails if the branch already exists.
    pub fn create_branch(&self, name: &RefName, from: GitOid) -> Result<()> {
        self.repo.atomic_ref_update(&[RefEdit {
            name: name.clone(),
            new_oid: from,
            expected_old_oid: GitOid::ZERO,
        }])?;
        Ok(())
    }

    /// Delete branch `name`. No-op if it does not exist.
    pub fn delete_branch(&self, name: &RefName) -> Result<()> {
        if *name == self.main {
            return Err(StoreError::Fault(GitError::BackendError {
                message: format!("refusing to delete the main line `{name}`"),
            }));
        }
        self.repo.delete_ref(name)?;
        Ok(())
    }

    /// Branches under the configured ephemeral prefix.
    pub fn ephemeral_branches(&self) -> Result<Vec<RefName>> {
        Ok(self
            .repo
            .list_refs(&self.config.branch_prefix)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Working state
    // -----------------------------------------------------------------------

    /// Switch the working state to `branch`, rewriting the working file from
    /// the branch tip. Uncommitted working-file changes are discarded.
    pub fn checkout(&mut self, branch: &RefName) -> Result<()> {
        let tip = self.repo.read_ref(branch)?;
        let content = match tip {
            Some(commit) => self.document_at(commit)?,
            None => None,
        };

        let path = self.working_file();
        match content {
            Some(bytes) => std::fs::write(&path, bytes)?,
            None => match std::fs::remove_file(&path) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            },
        }

        tracing::trace!(branch = %branch, tip = ?tip.map(|t| t.short()), "checked out");
        self.head = Checkout {
            branch: branch.clone(),
            tip,
        };
        Ok(())
    }

    /// Read the working file, or `None` if it does not exist.
    pub fn read_working_file(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.working_file()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the working file.
    pub fn write_working_file(&self, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.working_file(), bytes)?;
        Ok(())
    }

    /// Record the working file as a new commit on the checked-out branch.
    ///
    /// The new commit's only parent is the tip observed at checkout (none for
    /// a first commit). The branch ref moves with compare-and-swap, so a
    /// concurrent writer that moved it first makes this fail with
    /// [`GitError::RefConflict`].
    pub fn commit(&mut self) -> Result<GitOid> {
        let content = self.read_working_file()?;
        let parent = self.head.tip;

        let base_tree = match parent {
            Some(commit) => self.repo.read_commit(commit)?.tree_oid,
            None => self.repo.write_tree(&[])?,
        };
        let edit = match content {
            Some(bytes) => TreeEdit::Upsert {
                path: self.config.document.clone(),
                mode: EntryMode::Blob,
                oid: self.repo.write_blob(&bytes)?,
            },
            None => TreeEdit::Remove {
                path: self.config.document.clone(),
            },
        };
        let tree = self.repo.edit_tree(base_tree, &[edit])?;

        let parents: Vec<GitOid> = parent.into_iter().collect();
        let commit = self.repo.create_commit(
            tree,
            &parents,
            &self.config.commit_message,
            &self.config.identity(),
        )?;
        self.repo.atomic_ref_update(&[RefEdit {
            name: self.head.branch.clone(),
            new_oid: commit,
            expected_old_oid: parent.unwrap_or(GitOid::ZERO),
        }])?;

        tracing::debug!(branch = %self.head.branch, commit = %commit.short(), "committed");
        self.head.tip = Some(commit);
        Ok(commit)
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Merge `branch` into the main line.
    ///
    /// The working state is switched to the main line first and reflects the
    /// main line's tip afterwards, whatever the outcome. The main ref only
    /// moves if it still holds the tip this merge started from.
    pub fn merge(&mut self, branch: &RefName) -> Result<MergeOutcome> {
        let main = self.main.clone();
        self.checkout(&main)?;

        let theirs = self.repo.read_ref(branch)?.ok_or_else(|| GitError::NotFound {
            message: format!("branch {branch}"),
        })?;
        let Some(ours) = self.head.tip else {
            // Unborn main line: adopt the branch wholesale.
            return self.advance_main(GitOid::ZERO, theirs, MergeOutcome::FastForward(theirs));
        };

        if self.repo.is_ancestor(theirs, ours)? {
            return Ok(MergeOutcome::UpToDate(ours));
        }

        let Some(base) = self.repo.merge_base(ours, theirs)? else {
            tracing::warn!(branch = %branch, "no common ancestor with the main line");
            return Ok(MergeOutcome::Conflicted { conflicts: 1 });
        };
        if base == ours {
            return self.advance_main(ours, theirs, MergeOutcome::FastForward(theirs));
        }

        let base_tree = self.repo.read_commit(base)?.tree_oid;
        let ours_tree = self.repo.read_commit(ours)?.tree_oid;
        let theirs_tree = self.repo.read_commit(theirs)?.tree_oid;
        let merged = self.repo.merge_trees(base_tree, ours_tree, theirs_tree)?;
        let Some(tree) = merged.tree else {
            tracing::info!(
                branch = %branch,
                base = %base.short(),
                conflicts = merged.conflict_count,
                "merge conflicted"
            );
            return Ok(MergeOutcome::Conflicted {
                conflicts: merged.conflict_count,
            });
        };

        let message = format!("Merge {branch} into {main}");
        let commit =
            self.repo
                .create_commit(tree, &[ours, theirs], &message, &self.config.identity())?;
        self.advance_main(ours, commit, MergeOutcome::Merged(commit))
    }

    /// Move the main line from `expected` to `new` and refresh the checkout.
    fn advance_main(
        &mut self,
        expected: GitOid,
        new: GitOid,
        outcome: MergeOutcome,
    ) -> Result<MergeOutcome> {
        let main = self.main.clone();
        let cas = self.repo.atomic_ref_update(&[RefEdit {
            name: main.clone(),
            new_oid: new,
            expected_old_oid: expected,
        }]);
        let outcome = match cas {
            Ok(()) => outcome,
            Err(GitError::RefConflict { message, .. }) => {
                tracing::info!(%message, "main line moved during merge");
                MergeOutcome::MainLineMoved
            }
            Err(e) => return Err(e.into()),
        };
        self.checkout(&main)?;
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// The document bytes stored in `commit`, if the file exists there.
    pub(crate) fn document_at(&self, commit: GitOid) -> Result<Option<Vec<u8>>> {
        let tree = self.repo.read_commit(commit)?.tree_oid;
        let entry = self
            .repo
            .read_tree(tree)?
            .into_iter()
            .find(|e| e.name == self.config.document && e.mode != EntryMode::Tree);
        match entry {
            Some(e) => Ok(Some(self.repo.read_blob(e.oid)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` commits of the main line, newest first, following first
    /// parents.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        let mut next = self.main_tip()?;
        while let Some(oid) = next {
            if entries.len() == limit {
                break;
            }
            let info = self.repo.read_commit(oid)?;
            next = info.parents.first().copied();
            entries.push(HistoryEntry {
                version: VersionToken::from_oid(oid),
                message: info.message.trim_end().to_owned(),
                is_merge: info.parents.len() > 1,
            });
        }
        Ok(entries)
    }
}
