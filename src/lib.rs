//! An encoder and decoder for SMILE, the compact binary interchange format
//! that is semantically equivalent to JSON.
//!
//! SMILE trades human readability for density: every element starts with a
//! single token byte, integers are zigzag/varint packed, and recently seen
//! field names and short string values can be replaced with one- or two-byte
//! back-references into a pair of shared-string tables that the encoder and
//! decoder maintain in lockstep.
//!
//! The usual entry points are [`encode`]/[`decode`], which move a [`Value`]
//! tree to and from bytes, and [`to_vec`]/[`from_slice`], which do the same
//! for any type implementing serde's traits:
//!
//! ```
//! use smile_pack::{decode, encode, Value};
//!
//! let doc = Value::from(vec![Value::from(1i64), Value::from("one")]);
//! let bytes = encode(&doc)?;
//! assert_eq!(decode(&bytes)?, doc);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Lower-level access goes through [`SmileWriter`], which exposes one method
//! per token, and [`Parser`], a pull-parser that yields [`Element`] events
//! and can be driven as an iterator.

mod bits;
mod shared;
mod token;
mod varint;

pub mod de;
pub mod decode;
pub mod encode;
pub mod error;
pub mod ser;
pub mod value;

pub use self::de::{from_slice, from_slice_headerless};
pub use self::decode::{decode, decode_all, decode_headerless, Element, Header, Parser};
pub use self::encode::{encode, encode_with_options, SmileOptions, SmileWriter};
pub use self::error::{DecodeError, Error, Result};
pub use self::ser::{to_vec, to_vec_with_options};
pub use self::value::Value;

/// Maximum number of nested containers the codec will track before erroring.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Capacity of each shared-string table. Inserting past this resets the
/// table on both the encoder and decoder side.
pub const MAX_SHARED_ENTRIES: usize = 1024;

/// Longest UTF-8 byte length a string may have and still enter a
/// shared-string table.
pub const MAX_SHAREABLE_BYTES: usize = 64;
