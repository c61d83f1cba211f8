//! The optimistic-concurrency write path.
//!
//! An update names the version it was derived from. The store stages the
//! candidate on an ephemeral branch rooted at that version, then merges the
//! branch into the main line. Edits that touch disjoint lines of the encoded
//! document merge; overlapping edits are rejected and the caller re-reads.
//!
//! ```text
//!   main:  t0 ──── t1 ──── M        t1: someone else's update
//!            \            /
//!   upload:   └── c ─────┘          c: the candidate, parent t0
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use confvault_git::{GitError, GitOid, RefName};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{BinaryCodec, DocumentCodec, JsonCodec};
use crate::error::{Result, StoreError};
use crate::snapshot::{Snapshot, VersionToken};
use crate::store::{ConfigStore, MergeOutcome};

/// Why an upload was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    /// The candidate's changes overlap changes made on the main line since
    /// its base version.
    Content {
        /// Number of unresolved conflicts reported by the merge.
        conflicts: usize,
    },
    /// Another writer advanced the main line while this upload was in
    /// flight.
    MainLineMoved,
}

/// Outcome of [`ConfigStore::upload_update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The update landed on the main line.
    Applied {
        /// The main line's new tip.
        version: VersionToken,
    },
    /// The update was rejected and the main line is unchanged. Re-read a
    /// fresh snapshot and retry.
    Conflict {
        /// The version the rejected candidate was derived from.
        base: Option<VersionToken>,
        /// Why it was rejected.
        reason: ConflictReason,
    },
}

impl UploadOutcome {
    /// Returns `true` if the update was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The new main-line version, if the update was applied.
    #[must_use]
    pub const fn version(&self) -> Option<VersionToken> {
        match self {
            Self::Applied { version } => Some(*version),
            Self::Conflict { .. } => None,
        }
    }
}

impl ConfigStore {
    /// Apply `candidate` to the main line if it does not conflict with what
    /// happened there since `candidate.version`.
    ///
    /// - Empty history: the candidate becomes the first commit; its version
    ///   is ignored.
    /// - Otherwise the version must name a commit in the main line's history
    ///   ([`StoreError::InvalidVersionToken`] if not, with no mutation).
    ///
    /// A rejected update returns [`UploadOutcome::Conflict`] and leaves the
    /// main line unchanged. No retry happens here.
    pub fn upload_update<T, C>(&mut self, candidate: &Snapshot<T>, codec: &C) -> Result<UploadOutcome>
    where
        C: DocumentCodec<T> + ?Sized,
    {
        let base_label = candidate
            .version
            .map_or_else(|| "none".to_owned(), |v| v.short());
        let _enter = tracing::info_span!("upload", base = %base_label, format = codec.format())
            .entered();
        let mut timer = StepTimer::start();

        let bytes = codec.encode(&candidate.data).map_err(StoreError::Encode)?;
        timer.lap("encode");

        let Some(tip) = self.main_tip()? else {
            // Nothing to diverge from.
            return self.commit_on_main(&bytes, candidate.version, &mut timer);
        };

        let token = candidate.version.ok_or_else(|| {
            StoreError::invalid_token(
                "<none>",
                "the store has history; an update must name the version it was derived from",
            )
        })?;
        let base = self.resolve_token(token)?;
        timer.lap("resolve token");

        let mut branch = EphemeralBranch::create(self, base)?;
        timer.lap("create branch");

        let merged = branch.stage(&bytes, &mut timer)?;
        let name = branch.name.clone();
        drop(branch);
        timer.lap("cleanup");

        let outcome = match merged {
            MergeOutcome::FastForward(commit)
            | MergeOutcome::Merged(commit)
            | MergeOutcome::UpToDate(commit) => UploadOutcome::Applied {
                version: VersionToken::from_oid(commit),
            },
            MergeOutcome::Conflicted { conflicts } => UploadOutcome::Conflict {
                base: Some(token),
                reason: ConflictReason::Content { conflicts },
            },
            MergeOutcome::MainLineMoved => UploadOutcome::Conflict {
                base: Some(token),
                reason: ConflictReason::MainLineMoved,
            },
        };

        match outcome {
            UploadOutcome::Applied { version } => tracing::info!(
                branch = %name,
                tip_before = %tip.short(),
                version = %version.short(),
                "update applied"
            ),
            UploadOutcome::Conflict { reason, .. } => {
                tracing::info!(branch = %name, ?reason, "update rejected");
            }
        }
        Ok(outcome)
    }

    /// Commit `data` on the main line regardless of what it holds now.
    ///
    /// Used to seed a store or to force a known state. Only a concurrent
    /// writer moving the main line in the same instant can reject it.
    pub fn overwrite<T, C>(&mut self, data: &T, codec: &C) -> Result<UploadOutcome>
    where
        C: DocumentCodec<T> + ?Sized,
    {
        let _enter = tracing::info_span!("overwrite", format = codec.format()).entered();
        let mut timer = StepTimer::start();
        let bytes = codec.encode(data).map_err(StoreError::Encode)?;
        timer.lap("encode");
        self.commit_on_main(&bytes, None, &mut timer)
    }

    /// [`upload_update`](Self::upload_update) with [`JsonCodec`].
    pub fn upload_json_update<T>(&mut self, candidate: &Snapshot<T>) -> Result<UploadOutcome>
    where
        T: Serialize + DeserializeOwned,
    {
        self.upload_update(candidate, &JsonCodec::<T>::new())
    }

    /// [`upload_update`](Self::upload_update) with [`BinaryCodec`].
    pub fn upload_binary_update(&mut self, candidate: &Snapshot<Vec<u8>>) -> Result<UploadOutcome> {
        self.upload_update(candidate, &BinaryCodec)
    }

    fn commit_on_main(
        &mut self,
        bytes: &[u8],
        base: Option<VersionToken>,
        timer: &mut StepTimer,
    ) -> Result<UploadOutcome> {
        let main = self.main.clone();
        self.checkout(&main)?;
        timer.lap("checkout main");
        self.write_working_file(bytes)?;
        timer.lap("write");

        let committed = self.commit();
        timer.lap("commit");
        match committed {
            Ok(commit) => {
                tracing::info!(version = %commit.short(), "committed on main line");
                Ok(UploadOutcome::Applied {
                    version: VersionToken::from_oid(commit),
                })
            }
            Err(StoreError::Fault(GitError::RefConflict { .. })) => {
                self.checkout(&main)?;
                Ok(UploadOutcome::Conflict {
                    base,
                    reason: ConflictReason::MainLineMoved,
                })
            }
            Err(e) => {
                self.checkout(&main)?;
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Ephemeral branch
// ---------------------------------------------------------------------------

/// Process-wide sequence for ephemeral branch names.
static BRANCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// A branch that exists for one upload attempt.
///
/// Dropping the guard deletes the branch and puts the store's working state
/// back on the main line, on every exit path.
struct EphemeralBranch<'a> {
    store: &'a mut ConfigStore,
    name: RefName,
    base: GitOid,
}

impl<'a> EphemeralBranch<'a> {
    fn create(store: &'a mut ConfigStore, base: GitOid) -> Result<Self> {
        let name = branch_name(&store.config.branch_prefix, base)?;
        store.create_branch(&name, base)?;
        tracing::debug!(branch = %name, base = %base.short(), "created ephemeral branch");
        Ok(Self { store, name, base })
    }

    /// Commit `bytes` on the branch and merge it into the main line.
    fn stage(&mut self, bytes: &[u8], timer: &mut StepTimer) -> Result<MergeOutcome> {
        let name = self.name.clone();
        self.checkout(&name)?;
        timer.lap("checkout branch");

        self.write_working_file(bytes)?;
        timer.lap("write");

        let commit = self.commit()?;
        tracing::debug!(branch = %name, base = %self.base.short(), candidate = %commit.short(), "staged candidate");
        timer.lap("commit");

        let main = self.main.clone();
        self.checkout(&main)?;
        timer.lap("checkout main");

        let outcome = self.merge(&name)?;
        timer.lap("merge");
        Ok(outcome)
    }
}

impl Deref for EphemeralBranch<'_> {
    type Target = ConfigStore;

    fn deref(&self) -> &ConfigStore {
        self.store
    }
}

impl DerefMut for EphemeralBranch<'_> {
    fn deref_mut(&mut self) -> &mut ConfigStore {
        self.store
    }
}

impl Drop for EphemeralBranch<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.delete_branch(&self.name) {
            tracing::warn!(branch = %self.name, error = %e, "failed to delete ephemeral branch");
        }
        if *self.store.checked_out() != self.store.main {
            let main = self.store.main.clone();
            if let Err(e) = self.store.checkout(&main) {
                tracing::warn!(error = %e, "failed to restore main line checkout");
            }
        }
    }
}

/// `<prefix><base>-<seq>-<random>`: unique per process through the
/// sequence, across processes through the random suffix.
fn branch_name(prefix: &str, base: GitOid) -> Result<RefName> {
    let seq = BRANCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let nonce: u32 = rand::random();
    RefName::new(&format!("{prefix}{}-{seq}-{nonce:08x}", base.short())).map_err(|e| {
        StoreError::Config {
            path: std::path::PathBuf::new(),
            detail: format!("branch_prefix: {e}"),
        }
    })
}

// ---------------------------------------------------------------------------
// Step timing
// ---------------------------------------------------------------------------

struct StepTimer {
    last: Instant,
}

impl StepTimer {
    fn start() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    fn lap(&mut self, step: &'static str) {
        let now = Instant::now();
        let elapsed_us = u64::try_from(now.duration_since(self.last).as_micros()).unwrap_or(u64::MAX);
        tracing::debug!(step, elapsed_us, "upload step");
        self.last = now;
    }
}
