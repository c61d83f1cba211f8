//! Store configuration (`confvault.toml`).
//!
//! Every field has a default, and a missing file means all defaults. The
//! config describes how a store lays out its history; it is never stored in
//! that history itself.
//!
//! ```toml
//! main_branch = "main"
//! document = "settings.json"
//! branch_prefix = "refs/heads/upload/"
//! commit_message = "Upload new version"
//!
//! [identity]
//! name = "deploy-bot"
//! email = "deploy-bot@example.com"
//! ```

use std::path::{Path, PathBuf};

use confvault_git::{Identity, RefName};
use serde::Deserialize;

use crate::error::StoreError;

/// Top-level store configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Branch name of the main line (default: `"main"`).
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// File name of the persisted document (default: `"document.json"`).
    #[serde(default = "default_document")]
    pub document: String,

    /// Ref namespace for ephemeral upload branches.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Message recorded on upload commits.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Author and committer of new commits.
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// `[identity]` table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,
    #[serde(default = "default_identity_email")]
    pub email: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            email: default_identity_email(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            document: default_document(),
            branch_prefix: default_branch_prefix(),
            commit_message: default_commit_message(),
            identity: IdentityConfig::default(),
        }
    }
}

fn default_main_branch() -> String {
    "main".to_owned()
}

fn default_document() -> String {
    "document.json".to_owned()
}

fn default_branch_prefix() -> String {
    "refs/heads/upload/".to_owned()
}

fn default_commit_message() -> String {
    "Upload new version".to_owned()
}

fn default_identity_name() -> String {
    "confvault".to_owned()
}

fn default_identity_email() -> String {
    "confvault@localhost".to_owned()
}

impl StoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields [`StoreConfig::default`]. Unreadable files,
    /// invalid TOML, unknown fields and invalid values are errors.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(StoreError::Config {
                    path: path.to_owned(),
                    detail: format!("could not read file: {e}"),
                });
            }
        };
        Self::from_toml_str(&contents).map_err(|e| match e {
            StoreError::Config { detail, .. } => StoreError::Config {
                path: path.to_owned(),
                detail,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut detail = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                detail = format!("line {line}: {detail}");
            }
            StoreError::Config {
                path: PathBuf::new(),
                detail,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), StoreError> {
        let invalid = |detail: String| StoreError::Config {
            path: PathBuf::new(),
            detail,
        };

        self.main_ref()
            .map_err(|e| invalid(format!("main_branch: {e}")))?;

        let doc = self.document.as_str();
        if doc.is_empty() || doc == "." || doc == ".." || doc == ".git" {
            return Err(invalid(format!("document: `{doc}` is not a usable file name")));
        }
        if doc.contains('/') || doc.contains('\\') {
            return Err(invalid(format!(
                "document: `{doc}` must be a single path component"
            )));
        }

        let prefix = self.branch_prefix.as_str();
        if !prefix.starts_with("refs/") || !prefix.ends_with('/') {
            return Err(invalid(format!(
                "branch_prefix: `{prefix}` must start with `refs/` and end with `/`"
            )));
        }
        if self.main_ref().is_ok_and(|main| main.as_str().starts_with(prefix)) {
            return Err(invalid(
                "branch_prefix: must not contain the main line".to_owned(),
            ));
        }

        if self.identity.name.trim().is_empty() || self.identity.email.trim().is_empty() {
            return Err(invalid("identity: name and email must be set".to_owned()));
        }
        for (field, value) in [("name", &self.identity.name), ("email", &self.identity.email)] {
            if let Some(c) = value.chars().find(|&c| is_forbidden_in_identity(c)) {
                return Err(invalid(format!(
                    "identity.{field}: character {c:?} is not allowed"
                )));
            }
        }
        Ok(())
    }

    /// The main line's ref, `refs/heads/<main_branch>`.
    pub fn main_ref(&self) -> Result<RefName, confvault_git::RefNameError> {
        RefName::branch(&self.main_branch)
    }

    /// The commit identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(&self.identity.name, &self.identity.email)
    }
}

/// Characters that would break the repository config or a commit signature.
fn is_forbidden_in_identity(c: char) -> bool {
    matches!(c, '"' | '\\' | '<' | '>') || c.is_control()
}
