//! gix-backed three-way tree merge.
//!
//! Content merges use git's line-based text driver: hunks that overlap or
//! touch are conflicts, everything else is reconciled automatically.

use gix::merge::blob::builtin_driver::text::Labels;
use gix::merge::tree::TreatAsUnresolved;

use crate::convert::{from_gix_oid, to_gix_oid};
use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{GitOid, TreeMergeOutcome};

pub fn merge_trees(
    repo: &GixRepo,
    base: GitOid,
    ours: GitOid,
    theirs: GitOid,
) -> Result<TreeMergeOutcome, GitError> {
    let options = repo
        .repo
        .tree_merge_options()
        .map_err(|e| GitError::backend("tree merge options", e))?;
    let labels = Labels {
        ancestor: Some("base".into()),
        current: Some("main".into()),
        other: Some("update".into()),
    };

    let mut outcome = repo
        .repo
        .merge_trees(
            to_gix_oid(base),
            to_gix_oid(ours),
            to_gix_oid(theirs),
            labels,
            options,
        )
        .map_err(|e| GitError::backend("merge trees", e))?;

    if outcome.has_unresolved_conflicts(TreatAsUnresolved::git()) {
        let conflict_count = outcome.conflicts.len().max(1);
        tracing::debug!(%base, %ours, %theirs, conflict_count, "tree merge conflicted");
        return Ok(TreeMergeOutcome {
            tree: None,
            conflict_count,
        });
    }

    let id = outcome
        .tree
        .write()
        .map_err(|e| GitError::backend("write merged tree", e))?;
    Ok(TreeMergeOutcome {
        tree: Some(from_gix_oid(id.as_ref())),
        conflict_count: 0,
    })
}
