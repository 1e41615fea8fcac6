// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structured merge of the `mapRoles` field of the shared authentication object.
//!
//! The field is a YAML sequence of `{rolearn, username, groups}` mappings owned by
//! many writers. Entries are compared by exact `rolearn`; unknown keys and
//! entries written by others are never rewritten. A new entry is appended as a
//! text block after the existing content so the old text survives byte for
//! byte. If the combined text no longer parses to the old entries plus the new
//! one (unusual indentation, flow style), the whole sequence is re-serialised
//! from the parsed values instead.

use crate::types::AuthEntry;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapRolesError {
    #[error("mapRoles is not a YAML sequence: {0}")]
    Malformed(String),

    #[error("Failed to serialise mapRoles: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// An entry with the same principal is already present
    Unchanged,
    Updated(String),
}

/// Parse the field into raw entries, keeping keys this crate does not know about
pub fn parse(blob: &str) -> Result<Vec<Value>, MapRolesError> {
    if blob.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_yaml::from_str::<Value>(blob) {
        Ok(Value::Sequence(entries)) => Ok(entries),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => Err(MapRolesError::Malformed(format!(
            "expected a sequence, found {}",
            kind_of(&other)
        ))),
        Err(e) => Err(MapRolesError::Malformed(e.to_string())),
    }
}

/// Principals named by the entries, in order
pub fn principals(entries: &[Value]) -> Vec<&str> {
    entries
        .iter()
        .filter_map(|e| e.get("rolearn").and_then(Value::as_str))
        .collect()
}

pub fn contains_principal(entries: &[Value], principal: &str) -> bool {
    principals(entries).iter().any(|p| *p == principal)
}

/// Merge `entry` into `blob`, appending only when no entry names the same principal
pub fn merge(blob: &str, entry: &AuthEntry) -> Result<Merge, MapRolesError> {
    let existing = parse(blob)?;
    if contains_principal(&existing, &entry.rolearn) {
        return Ok(Merge::Unchanged);
    }

    let block = serde_yaml::to_string(&vec![entry])
        .map_err(|e| MapRolesError::Serialize(e.to_string()))?;

    let appended = append_block(blob, &block);
    if reparses_as(&appended, &existing, entry) {
        return Ok(Merge::Updated(appended));
    }

    let mut entries = existing;
    entries.push(
        serde_yaml::to_value(entry).map_err(|e| MapRolesError::Serialize(e.to_string()))?,
    );
    let rewritten =
        serde_yaml::to_string(&entries).map_err(|e| MapRolesError::Serialize(e.to_string()))?;
    Ok(Merge::Updated(rewritten))
}

fn append_block(blob: &str, block: &str) -> String {
    if blob.trim().is_empty() {
        return block.to_string();
    }
    let mut out = String::with_capacity(blob.len() + block.len() + 1);
    out.push_str(blob);
    if !blob.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    out
}

fn reparses_as(candidate: &str, existing: &[Value], entry: &AuthEntry) -> bool {
    let Ok(parsed) = parse(candidate) else {
        return false;
    };
    let Ok(expected) = serde_yaml::to_value(entry) else {
        return false;
    };
    parsed.len() == existing.len() + 1
        && parsed[..existing.len()] == *existing
        && parsed.last() == Some(&expected)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
