//! Document codecs.
//!
//! A codec turns a document into the bytes committed to history and back.
//! The store never inspects those bytes; conflict detection runs over them
//! line by line, so a codec's layout decides which concurrent edits merge.
//! [`JsonCodec`] writes one field per line for exactly that reason.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error from encoding or decoding a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecError {
    /// The codec's format name (e.g. `"json"`).
    pub format: &'static str,
    /// What went wrong.
    pub message: String,
}

impl CodecError {
    fn new(format: &'static str, err: impl fmt::Display) -> Self {
        Self {
            format,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.format, self.message)
    }
}

impl std::error::Error for CodecError {}

/// Encodes documents of type `T` to bytes and decodes them back.
///
/// Implementations must round-trip: `decode(&encode(doc)?)? == doc`.
pub trait DocumentCodec<T> {
    /// Short format name used in errors and logs.
    fn format(&self) -> &'static str;

    /// Serialize a document.
    fn encode(&self, doc: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a document.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Pretty-printed JSON: two-space indent, one field per line, trailing
/// newline.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DocumentCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn format(&self) -> &'static str {
        "json"
    }

    fn encode(&self, doc: &T) -> Result<Vec<u8>, CodecError> {
        let mut bytes =
            serde_json::to_vec_pretty(doc).map_err(|e| CodecError::new("json", e))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::new("json", e))
    }
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

/// TOML documents. Top-level keys land on their own lines, tables in their
/// own sections.
pub struct TomlCodec<T>(PhantomData<fn() -> T>);

impl<T> TomlCodec<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TomlCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DocumentCodec<T> for TomlCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn format(&self) -> &'static str {
        "toml"
    }

    fn encode(&self, doc: &T) -> Result<Vec<u8>, CodecError> {
        toml::to_string_pretty(doc)
            .map(String::into_bytes)
            .map_err(|e| CodecError::new("toml", e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let text = std::str::from_utf8(bytes).map_err(|e| CodecError::new("toml", e))?;
        toml::from_str(text).map_err(|e| CodecError::new("toml", e))
    }
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

/// Raw bytes, stored as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl DocumentCodec<Vec<u8>> for BinaryCodec {
    fn format(&self) -> &'static str {
        "binary"
    }

    fn encode(&self, doc: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(doc.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}
