// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Redacting wrapper for sensitive values (API tokens, bootstrap tokens, credential JSON).
//!
//! The inner value is only reachable through [`Secret::expose`], so every place that
//! hands a secret to a collaborator is visible in the code. `Debug`, `Display` and
//! `Serialize` all print a fixed placeholder.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the underlying value. Call this only at the point of use.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Secret<String> {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Serialize for Secret<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Secret)
    }
}

/// `serialize_with` helper for request fields that must carry the real value on the wire.
/// `Debug` on the containing struct stays redacted.
pub fn expose_option<T: Serialize, S: Serializer>(
    value: &Option<Secret<T>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    value.as_ref().map(Secret::expose).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let token = Secret::new("super-secret-token".to_string());

        assert_eq!(format!("{:?}", token), "Secret([REDACTED])");
        assert_eq!(token.to_string(), "[REDACTED]");
        assert!(!format!("{:?}", Some(&token)).contains("super-secret"));
    }

    #[test]
    fn test_expose_returns_inner_value() {
        let token: Secret<String> = "abc".into();
        assert_eq!(token.expose(), "abc");
    }

    #[test]
    fn test_serialize_is_redacted() {
        let token = Secret::new("abc".to_string());
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_expose_option_writes_inner_value() {
        #[derive(Serialize)]
        struct Payload {
            #[serde(serialize_with = "expose_option")]
            key: Option<Secret<String>>,
        }

        let json = serde_json::to_string(&Payload {
            key: Some(Secret::new("abc".to_string())),
        })
        .unwrap();
        assert_eq!(json, r#"{"key":"abc"}"#);

        let json = serde_json::to_string(&Payload { key: None }).unwrap();
        assert_eq!(json, r#"{"key":null}"#);
    }

    #[test]
    fn test_deserialize_reads_plain_value() {
        let token: Secret<String> = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(token.expose(), "abc");
    }

    #[test]
    fn test_is_empty_ignores_whitespace() {
        assert!(Secret::new("  ".to_string()).is_empty());
        assert!(!Secret::new("x".to_string()).is_empty());
    }
}
