//! # dstore Codec
//!
//! Attribute values and serializers for dstore.
//!
//! This crate provides:
//! - `Value`: the dynamic value stored in document attributes
//! - `Attributes`: a name-ordered attribute map
//! - `Serializer`: deterministic encoding with JSON and CBOR implementations
//!
//! ## Usage
//!
//! ```
//! use dstore_codec::{Attributes, JsonSerializer, Serializer, Value};
//!
//! let mut attrs = Attributes::new();
//! attrs.insert("title".to_string(), Value::from("Lamp"));
//!
//! let bytes = JsonSerializer.serialize(&attrs).unwrap();
//! assert_eq!(bytes, br#"{"title":"Lamp"}"#);
//!
//! let decoded: Attributes = JsonSerializer.deserialize(&bytes).unwrap();
//! assert_eq!(decoded, attrs);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod serializer;
mod value;

pub use error::{CodecError, CodecResult};
pub use serializer::{CborSerializer, JsonSerializer, Serializer};
pub use value::{Attributes, Value};
