use std::fmt;

use serde::{Deserialize, Serialize};

use crate::listing::DELIMITER;

/// A `(bucket, key)` pair naming one directory-like listing target.
///
/// The key never carries a trailing delimiter and is `None` at the bucket root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Scope {
    pub fn new(bucket: impl Into<String>, key: Option<&str>) -> Self {
        let key = key
            .map(|k| k.strip_suffix(DELIMITER).unwrap_or(k))
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Self {
            bucket: bucket.into(),
            key,
        }
    }

    pub fn root(bucket: impl Into<String>) -> Self {
        Self::new(bucket, None)
    }

    /// The scope for a subdirectory, given its full prefix as listed.
    ///
    /// `prefix` already lacks its trailing delimiter and is taken verbatim:
    /// the prefix `a/` (listed as `a//`) is a different directory from `a`.
    pub fn child(&self, prefix: &str) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: Some(prefix.to_string()),
        }
    }

    /// The prefix to send to the listing service.
    pub fn list_prefix(&self) -> Option<String> {
        self.key.as_ref().map(|k| format!("{}{}", k, DELIMITER))
    }

    /// Deterministic persistent-store key: `{"bucket":…,"key":…}` with `key`
    /// omitted at the root.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"bucket\":{:?}}}", self.bucket))
    }

    /// Inverse of [`Scope::cache_key`].
    pub fn from_cache_key(key: &str) -> Option<Self> {
        serde_json::from_str(key).ok()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}/{}", self.bucket, key),
            None => write!(f, "{}", self.bucket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_normalized() {
        assert_eq!(Scope::new("b", Some("a/b/")).key.as_deref(), Some("a/b"));
        assert_eq!(Scope::new("b", Some("")).key, None);
        assert_eq!(Scope::new("b", Some("/")).key, None);
        assert_eq!(Scope::root("b"), Scope::new("b", None));
    }

    #[test]
    fn test_list_prefix() {
        assert_eq!(Scope::root("b").list_prefix(), None);
        assert_eq!(Scope::new("b", Some("a/b")).list_prefix().as_deref(), Some("a/b/"));
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(Scope::root("b").cache_key(), r#"{"bucket":"b"}"#);
        assert_eq!(
            Scope::new("b", Some("x/y")).cache_key(),
            r#"{"bucket":"b","key":"x/y"}"#
        );
        assert_eq!(
            Scope::from_cache_key(r#"{"bucket":"b","key":"x/y"}"#),
            Some(Scope::new("b", Some("x/y")))
        );
        assert_eq!(Scope::from_cache_key("not json"), None);
    }

    #[test]
    fn test_child_and_display() {
        let child = Scope::root("b").child("data/2024");
        assert_eq!(child.key.as_deref(), Some("data/2024"));
        assert_eq!(child.to_string(), "b/data/2024");
    }

    #[test]
    fn test_only_one_trailing_delimiter_is_dropped() {
        assert_eq!(Scope::new("b", Some("a//")).key.as_deref(), Some("a/"));
        assert_eq!(Scope::new("b", Some("a//")).list_prefix().as_deref(), Some("a//"));

        let child = Scope::new("b", Some("a")).child("a/");
        assert_eq!(child.key.as_deref(), Some("a/"));
        assert_ne!(child, Scope::new("b", Some("a")));
        assert_eq!(child.list_prefix().as_deref(), Some("a//"));
    }
}
