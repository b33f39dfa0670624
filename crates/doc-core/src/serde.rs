//! Canonical JSON and YAML helpers.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DocError, ErrorInfo};

fn serde_error(code: &str, err: impl ToString) -> DocError {
    DocError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with sorted object keys.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, DocError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Serializes a value into YAML, keeping struct field and map insertion order.
///
/// The output stays readable by YAML 1.1 loaders: strings such as `y` or
/// `off` are double-quoted, see [`quote_yaml11_bools`].
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, DocError> {
    serde_yaml::to_string(value)
        .map(|text| quote_yaml11_bools(&text))
        .map_err(|err| serde_error("yaml-serialize", err))
}

// Plain scalars YAML 1.1 resolves to booleans that YAML 1.2 keeps as strings.
const YAML11_BOOL_WORDS: [&str; 6] = ["y", "n", "yes", "no", "on", "off"];

/// Double-quotes plain scalar values a YAML 1.1 loader would read as booleans.
///
/// Works on block style output as produced by `serde_yaml`. Mapping keys and
/// the contents of block scalars are left untouched.
pub fn quote_yaml11_bools(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut block_parent: Option<usize> = None;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(&['\n', '\r'][..]);
        let indent = content.len() - content.trim_start().len();
        if let Some(parent) = block_parent {
            if content.trim().is_empty() || indent > parent {
                out.push_str(line);
                continue;
            }
            block_parent = None;
        }

        let mut rest = &content[indent..];
        let mut item = false;
        while let Some(stripped) = rest.strip_prefix("- ") {
            rest = stripped;
            item = true;
        }
        let value = match rest.rfind(": ") {
            Some(idx) => &rest[idx + 2..],
            None if item => rest,
            None => "",
        };
        if value.starts_with('|') || value.starts_with('>') {
            block_parent = Some(indent);
        }
        if YAML11_BOOL_WORDS
            .iter()
            .any(|word| value.eq_ignore_ascii_case(word))
        {
            out.push_str(&content[..content.len() - value.len()]);
            out.push('"');
            out.push_str(value);
            out.push('"');
            out.push_str(&line[content.len()..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Deserializes a YAML document into the requested type.
pub fn from_yaml_str<T: DeserializeOwned>(data: &str) -> Result<T, DocError> {
    serde_yaml::from_str(data).map_err(|err| serde_error("yaml-deserialize", err))
}
