//! gix-backed object read/write and tree editing operations.

use crate::convert::{from_gix_entry_mode, from_gix_oid, to_gix_entry_kind, to_gix_oid};
use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{CommitInfo, GitOid, Identity, TreeEdit, TreeEntry};

/// A missing object or one of the wrong kind is [`GitError::NotFound`].
/// Anything else, such as an object that fails to inflate, is a backend
/// fault.
fn find_error(
    kind: &str,
    oid: GitOid,
    err: &gix::object::find::existing::with_conversion::Error,
) -> GitError {
    use gix::object::find::existing::Error as FindError;
    use gix::object::find::existing::with_conversion::Error as LookupError;

    match err {
        LookupError::Find(FindError::NotFound { .. }) | LookupError::Convert(_) => {
            GitError::NotFound {
                message: format!("{kind} {oid}: {err}"),
            }
        }
        LookupError::Find(FindError::Find(_)) => {
            GitError::backend(&format!("read {kind} {oid}"), err)
        }
    }
}

pub fn read_blob(repo: &GixRepo, oid: GitOid) -> Result<Vec<u8>, GitError> {
    let mut blob = repo
        .repo
        .find_blob(to_gix_oid(oid))
        .map_err(|e| find_error("blob", oid, &e))?;
    Ok(blob.take_data())
}

pub fn read_tree(repo: &GixRepo, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(oid))
        .map_err(|e| find_error("tree", oid, &e))?;

    let mut entries = Vec::new();
    for result in tree.iter() {
        let entry = result.map_err(|e| GitError::backend("decode tree entry", e))?;
        entries.push(TreeEntry {
            name: entry.inner.filename.to_string(),
            mode: from_gix_entry_mode(entry.inner.mode),
            oid: from_gix_oid(entry.inner.oid),
        });
    }
    Ok(entries)
}

pub fn read_commit(repo: &GixRepo, oid: GitOid) -> Result<CommitInfo, GitError> {
    let commit = repo
        .repo
        .find_commit(to_gix_oid(oid))
        .map_err(|e| find_error("commit", oid, &e))?;

    let decoded = commit
        .decode()
        .map_err(|e| GitError::backend(&format!("decode commit {oid}"), e))?;

    let author = decoded.author();
    let committer = decoded.committer();

    Ok(CommitInfo {
        tree_oid: from_gix_oid(&decoded.tree()),
        parents: decoded.parents().map(|p| from_gix_oid(&p)).collect(),
        message: decoded.message.to_string(),
        author: format!("{} <{}>", author.name, author.email),
        committer: format!("{} <{}>", committer.name, committer.email),
    })
}

pub fn write_blob(repo: &GixRepo, data: &[u8]) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .write_blob(data)
        .map_err(|e| GitError::backend("write blob", e))?;
    Ok(from_gix_oid(id.as_ref()))
}

pub fn write_tree(repo: &GixRepo, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
    let mut tree = gix::objs::Tree {
        entries: entries
            .iter()
            .map(|e| gix::objs::tree::Entry {
                mode: to_gix_entry_kind(e.mode).into(),
                filename: e.name.as_str().into(),
                oid: to_gix_oid(e.oid),
            })
            .collect(),
    };
    // git requires tree entries in canonical order.
    tree.entries.sort();
    let id = repo
        .repo
        .write_object(&tree)
        .map_err(|e| GitError::backend("write tree", e))?;
    Ok(from_gix_oid(id.as_ref()))
}

pub fn edit_tree(repo: &GixRepo, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(base))
        .map_err(|e| find_error("base tree", base, &e))?;

    let mut editor = tree
        .edit()
        .map_err(|e| GitError::backend("create tree editor", e))?;

    for edit in edits {
        match edit {
            TreeEdit::Upsert { path, mode, oid } => {
                editor
                    .upsert(path.as_str(), to_gix_entry_kind(*mode), to_gix_oid(*oid))
                    .map_err(|e| GitError::backend(&format!("tree edit upsert '{path}'"), e))?;
            }
            TreeEdit::Remove { path } => {
                editor
                    .remove(path.as_str())
                    .map_err(|e| GitError::backend(&format!("tree edit remove '{path}'"), e))?;
            }
        }
    }

    let new_id = editor
        .write()
        .map_err(|e| GitError::backend("write edited tree", e))?;
    Ok(from_gix_oid(new_id.as_ref()))
}

pub fn create_commit(
    repo: &GixRepo,
    tree: GitOid,
    parents: &[GitOid],
    message: &str,
    identity: &Identity,
) -> Result<GitOid, GitError> {
    let signature = gix::actor::Signature {
        name: identity.name.as_str().into(),
        email: identity.email.as_str().into(),
        time: gix::date::Time::now_local_or_utc(),
    };

    let commit = gix::objs::Commit {
        message: message.into(),
        tree: to_gix_oid(tree),
        author: signature.clone(),
        committer: signature,
        encoding: None,
        parents: parents.iter().map(|p| to_gix_oid(*p)).collect(),
        extra_headers: Vec::new(),
    };
    let id = repo
        .repo
        .write_object(&commit)
        .map_err(|e| GitError::backend("write commit", e))?;
    Ok(from_gix_oid(id.as_ref()))
}
