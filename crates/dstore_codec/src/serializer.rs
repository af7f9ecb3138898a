//! Pluggable serializers for stored documents and references.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Turns values into bytes for the engine and back.
///
/// # Invariants
///
/// - Encoding is deterministic: equal values produce equal bytes, so stored
///   bytes can be compared to skip redundant writes
/// - `deserialize(serialize(v)) == v` for every supported value
///
/// # Implementors
///
/// - [`JsonSerializer`] - default, human readable
/// - [`CborSerializer`] - compact binary
pub trait Serializer: Send + Sync {
    /// Encodes a value.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decodes a value.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// CBOR via `ciborium`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborSerializer;

impl Serializer for CborSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "cbor"
    }
}
