use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::Result;

/// Separator used to group keys into "directories".
pub const DELIMITER: &str = "/";

/// One ListObjectsV2 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    /// Key prefix to list under, with its trailing delimiter; `None` for the bucket root.
    pub prefix: Option<String>,
    pub max_keys: usize,
    pub delimiter: String,
    /// Token from the previous page's response; `None` for the first page.
    pub continuation_token: Option<String>,
}

impl ListRequest {
    /// The request as wire parameters, named as the service names them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("bucket", self.bucket.clone())];
        if let Some(prefix) = &self.prefix {
            pairs.push(("prefix", prefix.clone()));
        }
        pairs.push(("max-keys", self.max_keys.to_string()));
        pairs.push(("delimiter", self.delimiter.clone()));
        if let Some(token) = &self.continuation_token {
            pairs.push(("continuation-token", token.clone()));
        }
        pairs
    }
}

/// A common prefix ("subdirectory") as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPrefix {
    pub prefix: Option<String>,
}

/// An object as returned by the service. Fields are optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<i64>,
}

/// One page of raw listing output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListResponse {
    pub common_prefixes: Vec<ListedPrefix>,
    pub contents: Vec<ListedObject>,
    pub truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// A paginated, delimiter-aware object listing service.
#[async_trait]
pub trait ListingService: Send + Sync {
    /// Fetch one page of results.
    async fn list_objects(&self, request: &ListRequest) -> Result<ListResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_use_service_parameter_names() {
        let request = ListRequest {
            bucket: "b".to_string(),
            prefix: Some("a/".to_string()),
            max_keys: 1000,
            delimiter: DELIMITER.to_string(),
            continuation_token: Some("tok".to_string()),
        };

        assert_eq!(
            request.query_pairs(),
            vec![
                ("bucket", "b".to_string()),
                ("prefix", "a/".to_string()),
                ("max-keys", "1000".to_string()),
                ("delimiter", "/".to_string()),
                ("continuation-token", "tok".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_omit_absent_fields() {
        let request = ListRequest {
            bucket: "b".to_string(),
            prefix: None,
            max_keys: 2,
            delimiter: DELIMITER.to_string(),
            continuation_token: None,
        };

        let names: Vec<_> = request.query_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["bucket", "max-keys", "delimiter"]);
    }
}
