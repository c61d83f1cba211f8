use std::fmt;

use serde::{Deserialize, Serialize};

/// The demo document: an id plus playlist bounds.
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

impl Playlist {
    pub fn new(id: &str, min: u32, max: u32) -> Self {
        Self {
            id: id.to_owned(),
            min,
            max,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id={}", self.id)?;
        for p in &self.playlists {
            write!(f, " [{} {}..{}]", p.id, p.min, p.max)?;
        }
        Ok(())
    }
}
