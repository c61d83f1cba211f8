//! gix-backed ref and ancestry operations.

use gix::refs::transaction::{Change, LogChange, PreviousValue, RefLog};
use gix::refs::{FullName, Target};

use crate::convert::{from_gix_oid, to_gix_oid};
use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{GitOid, RefEdit, RefName};

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(mut r)) => {
            let id = r
                .peel_to_id_in_place()
                .map_err(|e| GitError::backend(name.as_str(), e))?;
            Ok(Some(from_gix_oid(id.as_ref())))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(GitError::backend(name.as_str(), e)),
    }
}

pub fn delete_ref(repo: &GixRepo, name: &RefName) -> Result<(), GitError> {
    let r = repo
        .repo
        .try_find_reference(name.as_str())
        .map_err(|e| GitError::backend(name.as_str(), e))?;
    if let Some(r) = r {
        r.delete()
            .map_err(|e| GitError::backend(name.as_str(), e))?;
    }
    Ok(())
}

pub fn atomic_ref_update(repo: &GixRepo, edits: &[RefEdit]) -> Result<(), GitError> {
    // MustNotExist is not enforced by every ref backend.
    for edit in edits.iter().filter(|e| e.expected_old_oid.is_zero()) {
        if read_ref(repo, &edit.name)?.is_some() {
            return Err(GitError::RefConflict {
                ref_name: edit.name.as_str().to_owned(),
                message: "ref already exists".to_owned(),
            });
        }
    }

    let gix_edits: Vec<gix::refs::transaction::RefEdit> = edits
        .iter()
        .map(|edit| {
            let name: FullName = edit
                .name
                .as_str()
                .try_into()
                .map_err(|e: gix::validate::reference::name::Error| {
                    GitError::backend(edit.name.as_str(), e)
                })?;

            let expected = if edit.expected_old_oid.is_zero() {
                PreviousValue::MustNotExist
            } else {
                PreviousValue::MustExistAndMatch(Target::Object(to_gix_oid(
                    edit.expected_old_oid,
                )))
            };

            Ok(gix::refs::transaction::RefEdit {
                change: Change::Update {
                    log: LogChange {
                        mode: RefLog::AndReference,
                        force_create_reflog: false,
                        message: "confvault: compare-and-swap".into(),
                    },
                    expected,
                    new: Target::Object(to_gix_oid(edit.new_oid)),
                },
                name,
                deref: false,
            })
        })
        .collect::<Result<Vec<_>, GitError>>()?;

    repo.repo
        .edit_references(gix_edits)
        .map_err(|e| classify_edit_error(edits, e))?;
    Ok(())
}

/// Only an expected-value mismatch is a lost race. A lock that cannot be
/// taken (stale `.lock` file, unwritable directory) is a store fault.
fn classify_edit_error(edits: &[RefEdit], err: gix::reference::edit::Error) -> GitError {
    use gix::reference::edit::Error as EditError;
    use gix::refs::file::transaction::prepare::Error as PrepareError;

    match err {
        EditError::FileTransactionPrepare(
            ref e @ (PrepareError::ReferenceOutOfDate { .. }
            | PrepareError::MustNotExist { .. }
            | PrepareError::MustExist { .. }),
        ) => {
            let ref_name = edits
                .first()
                .map(|edit| edit.name.as_str().to_owned())
                .unwrap_or_default();
            GitError::RefConflict {
                ref_name,
                message: e.to_string(),
            }
        }
        EditError::FileTransactionPrepare(PrepareError::LockAcquire { full_name, source }) => {
            GitError::backend(&format!("lock {full_name}"), source)
        }
        other => GitError::backend("ref transaction", other),
    }
}

pub fn list_refs(repo: &GixRepo, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
    let platform = repo
        .repo
        .references()
        .map_err(|e| GitError::backend("list refs", e))?;
    let refs_iter = platform
        .prefixed(prefix)
        .map_err(|e| GitError::backend(prefix, e))?;

    let mut result = Vec::new();
    for r in refs_iter {
        let mut r = r.map_err(|e| GitError::backend(prefix, e))?;
        let name = r.name().as_bstr().to_string();
        let id = r
            .peel_to_id_in_place()
            .map_err(|e| GitError::backend(&name, e))?;
        if let Ok(ref_name) = RefName::new(&name) {
            result.push((ref_name, from_gix_oid(id.as_ref())));
        }
    }
    result.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    Ok(result)
}

pub fn is_ancestor(
    repo: &GixRepo,
    ancestor: GitOid,
    descendant: GitOid,
) -> Result<bool, GitError> {
    if ancestor == descendant {
        return Ok(true);
    }

    let ancestor_gix = to_gix_oid(ancestor);
    let walk = repo
        .repo
        .rev_walk([to_gix_oid(descendant)])
        .all()
        .map_err(|e| GitError::backend("rev-walk", e))?;

    for info in walk {
        let info = info.map_err(|e| GitError::backend("rev-walk", e))?;
        if info.id == ancestor_gix {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn merge_base(repo: &GixRepo, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError> {
    match repo.repo.merge_base(to_gix_oid(a), to_gix_oid(b)) {
        Ok(id) => Ok(Some(from_gix_oid(id.as_ref()))),
        Err(gix::repository::merge_base::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(GitError::backend("merge-base", e)),
    }
}
