//! Snapshot reads.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{BinaryCodec, DocumentCodec, JsonCodec};
use crate::error::{Result, StoreError};
use crate::snapshot::{Snapshot, VersionToken};
use crate::store::ConfigStore;

impl ConfigStore {
    /// Read the main line's document and its version token.
    ///
    /// Checks out the main line, reads the working file and decodes it. Fails
    /// with [`StoreError::NotFound`] before the first upload and with
    /// [`StoreError::Decode`] if the stored bytes are not a `T`.
    pub fn get_snapshot<T, C>(&mut self, codec: &C) -> Result<Snapshot<T>>
    where
        C: DocumentCodec<T> + ?Sized,
    {
        let main = self.main.clone();
        self.checkout(&main)?;

        let not_found = || StoreError::NotFound {
            path: self.config.document.clone(),
            revision: main.to_string(),
        };
        let tip = self.head.tip.ok_or_else(not_found)?;
        let bytes = self.read_working_file()?.ok_or_else(not_found)?;
        let data = codec.decode(&bytes).map_err(StoreError::Decode)?;

        tracing::debug!(version = %tip.short(), format = codec.format(), "read snapshot");
        Ok(Snapshot::with_version(data, VersionToken::from_oid(tip)))
    }

    /// Read the document as it was at `version`, without touching the working
    /// state. `version` must be part of the main line's history.
    pub fn get_snapshot_at<T, C>(&self, codec: &C, version: VersionToken) -> Result<Snapshot<T>>
    where
        C: DocumentCodec<T> + ?Sized,
    {
        let commit = self.resolve_token(version)?;
        let bytes = self
            .document_at(commit)?
            .ok_or_else(|| StoreError::NotFound {
                path: self.config.document.clone(),
                revision: version.to_string(),
            })?;
        let data = codec.decode(&bytes).map_err(StoreError::Decode)?;
        Ok(Snapshot::with_version(data, version))
    }

    /// [`get_snapshot`](Self::get_snapshot) with [`JsonCodec`].
    pub fn get_json_snapshot<T>(&mut self) -> Result<Snapshot<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.get_snapshot(&JsonCodec::<T>::new())
    }

    /// [`get_snapshot`](Self::get_snapshot) with [`BinaryCodec`].
    pub fn get_binary_snapshot(&mut self) -> Result<Snapshot<Vec<u8>>> {
        self.get_snapshot(&BinaryCodec)
    }
}
