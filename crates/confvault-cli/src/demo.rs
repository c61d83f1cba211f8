//! Two writers derive updates from the same version.
//!
//! The first changes the document id, the second changes the bounds of the
//! second playlist. The edits land on different lines of the stored JSON,
//! so both are applied and the final document carries both.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use confvault::{ConfigStore, JsonCodec, StoreConfig};

use crate::model::{Config, Playlist};

pub fn run(path: Option<&Path>, config: StoreConfig) -> Result<ExitCode> {
    let scratch;
    let path = match path {
        Some(p) => p,
        None => {
            scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
            scratch.path()
        }
    };

    let mut store = ConfigStore::create(path, config)
        .with_context(|| format!("Failed to create store at {}", path.display()))?;
    let codec = JsonCodec::<Config>::new();

    let initial = Config {
        id: "1".to_owned(),
        playlists: vec![Playlist::new("1-1", 1, 1), Playlist::new("1-2", 4, 8)],
    };
    store.overwrite(&initial, &codec)?;
    let snapshot = store.get_snapshot(&codec)?;
    println!("Initial snapshot: {} @ {}", snapshot.data, short(&snapshot));

    let rename = snapshot.clone().map(|mut c| {
        c.id = "2".to_owned();
        c
    });
    let widen = snapshot.map(|mut c| {
        c.playlists[1].min = 6;
        c.playlists[1].max = 10;
        c
    });

    let first = store.upload_update(&rename, &codec)?;
    println!("First update applied: {}", first.is_applied());
    let second = store.upload_update(&widen, &codec)?;
    println!("Second update applied: {}", second.is_applied());

    let result = store.get_snapshot(&codec)?;
    println!("Result snapshot: {} @ {}", result.data, short(&result));
    Ok(ExitCode::SUCCESS)
}

fn short<T>(snapshot: &confvault::Snapshot<T>) -> String {
    snapshot
        .version
        .map_or_else(|| "unversioned".to_owned(), |v| v.short())
}
