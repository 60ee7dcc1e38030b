//! Versioned document envelope
//!
//! Every persisted artifact is written as a two-element JSON array:
//! `[{"type": "...", "version": "..."}, payload]`. Readers check the type tag
//! and dispatch on the version tag; they never infer a version from the
//! payload's shape.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type and version tag of a persisted document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatInfo {
    pub type_name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompatHeader {
    #[serde(rename = "type")]
    type_name: String,
    version: String,
}

/// Wrap `payload` in a compat envelope
pub fn to_compat<T: Serialize>(info: &CompatInfo, payload: &T) -> Result<Value> {
    let header = CompatHeader {
        type_name: info.type_name.to_string(),
        version: info.version.to_string(),
    };
    Ok(Value::Array(vec![
        serde_json::to_value(header)?,
        serde_json::to_value(payload)?,
    ]))
}

/// Unwrap an envelope of `expected_type`, returning its version tag and the
/// raw payload
pub fn from_compat(expected_type: &str, value: Value) -> Result<(String, Value)> {
    let mut items = match value {
        Value::Array(items) if items.len() == 2 => items,
        _ => {
            return Err(Error::Compat {
                expected_type: expected_type.to_string(),
                found_type: "<not a compat document>".to_string(),
                found_version: "<none>".to_string(),
            })
        }
    };
    let payload = items.pop().unwrap_or(Value::Null);
    let header: CompatHeader = items
        .pop()
        .map(serde_json::from_value::<CompatHeader>)
        .transpose()?
        .ok_or_else(|| Error::Internal("compat header missing".to_string()))?;

    if header.type_name != expected_type {
        return Err(Error::Compat {
            expected_type: expected_type.to_string(),
            found_type: header.type_name,
            found_version: header.version,
        });
    }
    Ok((header.version, payload))
}

/// Unwrap an envelope that must be exactly at `info`'s version
pub fn from_compat_current<T: DeserializeOwned>(info: &CompatInfo, value: Value) -> Result<T> {
    let (version, payload) = from_compat(info.type_name, value)?;
    if version != info.version {
        return Err(Error::Compat {
            expected_type: format!("{}@{}", info.type_name, info.version),
            found_type: info.type_name.to_string(),
            found_version: version,
        });
    }
    Ok(serde_json::from_value(payload)?)
}
