#![deny(missing_docs)]
#![doc = "Core error, serialization and hashing primitives shared by the doc-eval crates."]

pub mod errors;
pub mod hash;
pub mod serde;

pub use errors::{DocError, ErrorInfo};
pub use hash::{stable_hash_string, stable_id};
pub use crate::serde::{
    from_yaml_str, quote_yaml11_bools, to_canonical_json_bytes, to_yaml_string,
};
