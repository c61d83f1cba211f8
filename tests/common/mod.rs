//! Shared test helpers for confvault integration tests.
//!
//! Every test gets its own store in a temp directory via [`TestStore::new`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use confvault::{ConfigStore, JsonCodec, Snapshot, StoreConfig, VersionToken};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub id: String,
    pub playlists: Vec<Playlist>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub min: u32,
    pub max: u32,
}

pub fn playlist(id: &str, min: u32, max: u32) -> Playlist {
    Playlist {
        id: id.to_owned(),
        min,
        max,
    }
}

/// `{ id: "1", playlists: [1-1 1..1, 1-2 4..8] }`
pub fn initial_config() -> Config {
    Config {
        id: "1".to_owned(),
        playlists: vec![playlist("1-1", 1, 1), playlist("1-2", 4, 8)],
    }
}

/// A config with `n` playlists, `p0`..`p{n-1}`, all `0..10`.
pub fn wide_config(n: usize) -> Config {
    Config {
        id: "wide".to_owned(),
        playlists: (0..n).map(|i| playlist(&format!("p{i}"), 0, 10)).collect(),
    }
}

pub fn codec() -> JsonCodec<Config> {
    JsonCodec::new()
}

/// A fresh store in a temp directory. The directory lives as long as the
/// value.
pub struct TestStore {
    dir: TempDir,
    pub store: ConfigStore,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = ConfigStore::create(&dir.path().join("store"), config)
            .expect("failed to create store");
        Self { dir, store }
    }

    /// A store already holding `config`, plus the snapshot read back.
    pub fn seeded(config: &Config) -> (Self, Snapshot<Config>) {
        let mut ts = Self::new();
        let outcome = ts
            .store
            .upload_update(&Snapshot::new(config.clone()), &codec())
            .expect("seed upload failed");
        assert!(outcome.is_applied(), "seed upload rejected: {outcome:?}");
        let snapshot = ts.store.get_snapshot(&codec()).expect("seed read failed");
        (ts, snapshot)
    }

    pub fn repo_path(&self) -> PathBuf {
        self.store.repo_path().to_owned()
    }

    /// Another instance over the same history with its own working
    /// directory.
    pub fn attach(&self, name: &str) -> ConfigStore {
        ConfigStore::attach(
            &self.repo_path(),
            &self.dir.path().join("instances").join(name),
            self.store.config().clone(),
        )
        .expect("failed to attach instance")
    }

    pub fn tip(&self) -> Option<VersionToken> {
        self.store.current_tip().expect("failed to read tip")
    }

    /// Raw bytes of the document at the main line's tip.
    pub fn main_bytes(&mut self) -> Vec<u8> {
        self.store
            .get_binary_snapshot()
            .expect("failed to read document bytes")
            .data
    }

    pub fn temp_path(&self) -> &Path {
        self.dir.path()
    }
}
