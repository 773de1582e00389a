//! Where to list: parsing `s3://` URLs, S3 web URLs and plain `bucket/key` paths.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::fetcher::Scope;
use crate::listing::DELIMITER;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("no bucket in location {0:?}")]
    MissingBucket(String),

    #[error("unsupported URL scheme {scheme:?} in {location:?}")]
    UnsupportedScheme { scheme: String, location: String },
}

pub type Result<T> = std::result::Result<T, LocationError>;

/// A bucket, an optional key within it, and what can be inferred about how
/// to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Key as written, without leading delimiters; `None` at the bucket root.
    /// [`S3Location::scope`] drops a trailing delimiter.
    pub key: Option<String>,
    /// Region named in an `*.amazonaws.com` hostname.
    pub region: Option<String>,
    /// Endpoint for hosts other than AWS, e.g. `http://localhost:9000`.
    pub endpoint: Option<String>,
    /// Whether the bucket was named in the URL path rather than the hostname.
    pub force_path_style: bool,
}

/// One breadcrumb: the key to list and the name to show for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub key: Option<String>,
    pub name: String,
}

impl S3Location {
    /// Parse any of:
    ///
    /// - `s3://bucket/key`
    /// - `https://bucket.s3[-website][.region].amazonaws.com/key`
    /// - `https://s3[.region].amazonaws.com/bucket/key`
    /// - `http(s)://host[:port]/bucket/key` for other S3-compatible services
    /// - `bucket/key`
    pub fn parse(location: &str) -> Result<Self> {
        let missing = || LocationError::MissingBucket(location.to_string());

        let Some((scheme, rest)) = location.split_once("://") else {
            let (bucket, key) = split_bucket(location).ok_or_else(missing)?;
            return Ok(Self::new(bucket, key));
        };

        match scheme {
            "s3" => {
                let (bucket, key) = split_bucket(rest).ok_or_else(missing)?;
                Ok(Self::new(bucket, key))
            }
            "http" | "https" => {
                let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
                let hostname = host.split(':').next().unwrap_or(host);
                match parse_aws_hostname(hostname) {
                    Some((Some(bucket), region)) => Ok(Self {
                        region,
                        ..Self::new(bucket.to_string(), trim_key(path))
                    }),
                    Some((None, region)) => {
                        let (bucket, key) = split_bucket(path).ok_or_else(missing)?;
                        Ok(Self {
                            region,
                            force_path_style: true,
                            ..Self::new(bucket, key)
                        })
                    }
                    None => {
                        let (bucket, key) = split_bucket(path).ok_or_else(missing)?;
                        Ok(Self {
                            endpoint: Some(format!("{}://{}", scheme, host)),
                            force_path_style: true,
                            ..Self::new(bucket, key)
                        })
                    }
                }
            }
            other => Err(LocationError::UnsupportedScheme {
                scheme: other.to_string(),
                location: location.to_string(),
            }),
        }
    }

    fn new(bucket: String, key: Option<String>) -> Self {
        Self {
            bucket,
            key,
            region: None,
            endpoint: None,
            force_path_style: false,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.bucket.clone(), self.key.as_deref())
    }

    /// Breadcrumbs from the bucket root down to this location.
    pub fn ancestors(&self) -> Vec<Ancestor> {
        let mut ancestors = vec![Ancestor {
            key: None,
            name: self.bucket.clone(),
        }];
        let scope = self.scope();
        let mut key = String::new();
        for piece in scope.key.iter().flat_map(|k| k.split(DELIMITER)) {
            if !key.is_empty() {
                key.push_str(DELIMITER);
            }
            key.push_str(piece);
            ancestors.push(Ancestor {
                key: Some(key.clone()),
                name: piece.to_string(),
            });
        }
        ancestors
    }
}

impl FromStr for S3Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "s3://{}/{}", self.bucket, key),
            None => write!(f, "s3://{}", self.bucket),
        }
    }
}

fn trim_key(key: &str) -> Option<String> {
    let key = key.trim_start_matches('/');
    (!key.is_empty()).then(|| key.to_string())
}

fn split_bucket(path: &str) -> Option<(String, Option<String>)> {
    let path = path.trim_start_matches('/');
    let (bucket, key) = path.split_once('/').unwrap_or((path, ""));
    if bucket.is_empty() {
        return None;
    }
    Some((bucket.to_string(), trim_key(key)))
}

/// Match `[bucket.]s3[-website][.region].amazonaws.com`, returning the
/// bucket and region it names.
fn parse_aws_hostname(hostname: &str) -> Option<(Option<&str>, Option<String>)> {
    let rest = hostname.strip_suffix(".amazonaws.com")?;

    // Bucket names may contain dots, so find the `s3` label from the right.
    let labels: Vec<&str> = rest.split('.').collect();
    let s3_idx = labels
        .iter()
        .rposition(|l| *l == "s3" || *l == "s3-website" || l.starts_with("s3-website-"))?;

    let bucket = (s3_idx > 0).then(|| {
        let end = labels[..s3_idx].iter().map(|l| l.len() + 1).sum::<usize>() - 1;
        &rest[..end]
    });
    let region = match &labels[s3_idx + 1..] {
        [] => labels[s3_idx].strip_prefix("s3-website-").map(str::to_string),
        [region] => Some(region.to_string()),
        _ => return None,
    };
    Some((bucket, region))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_s3_urls() {
        let loc = S3Location::parse("s3://my-bucket/a/b/").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.key.as_deref(), Some("a/b/"));
        assert_eq!(loc.scope().key.as_deref(), Some("a/b"));
        assert_eq!(loc.endpoint, None);
        assert_eq!(loc.to_string(), "s3://my-bucket/a/b/");

        let loc: S3Location = "my-bucket".parse().unwrap();
        assert_eq!(loc.key, None);
        assert_eq!(loc.scope(), Scope::root("my-bucket"));

        assert!(S3Location::parse("s3://").is_err());
        assert!(S3Location::parse("/").is_err());
    }

    #[test]
    fn test_virtual_hosted_urls() {
        let loc = S3Location::parse("https://my.bucket.s3.us-west-2.amazonaws.com/data/").unwrap();
        assert_eq!(loc.bucket, "my.bucket");
        assert_eq!(loc.key.as_deref(), Some("data/"));
        assert_eq!(loc.region.as_deref(), Some("us-west-2"));
        assert!(!loc.force_path_style);

        let loc = S3Location::parse("http://b.s3-website-us-east-1.amazonaws.com").unwrap();
        assert_eq!(loc.bucket, "b");
        assert_eq!(loc.region.as_deref(), Some("us-east-1"));

        let loc = S3Location::parse("https://b.s3.amazonaws.com/index.html").unwrap();
        assert_eq!(loc.region, None);
        assert_eq!(loc.key.as_deref(), Some("index.html"));
    }

    #[test]
    fn test_path_style_urls() {
        let loc = S3Location::parse("https://s3.eu-west-1.amazonaws.com/b/x/y").unwrap();
        assert_eq!(loc.bucket, "b");
        assert_eq!(loc.key.as_deref(), Some("x/y"));
        assert_eq!(loc.region.as_deref(), Some("eu-west-1"));
        assert!(loc.force_path_style);
        assert_eq!(loc.endpoint, None);

        let loc = S3Location::parse("http://localhost:9000/b/x").unwrap();
        assert_eq!(loc.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(loc.force_path_style);

        assert!(matches!(
            S3Location::parse("https://s3.amazonaws.com/"),
            Err(LocationError::MissingBucket(_))
        ));
        assert!(matches!(
            S3Location::parse("gs://b/x"),
            Err(LocationError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_ancestors() {
        let loc = S3Location::parse("s3://b/x/y").unwrap();
        let names: Vec<_> = loc
            .ancestors()
            .into_iter()
            .map(|a| (a.key, a.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (None, "b".to_string()),
                (Some("x".to_string()), "x".to_string()),
                (Some("x/y".to_string()), "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_inner_empty_segment_survives() {
        let loc = S3Location::parse("s3://b/a//").unwrap();
        assert_eq!(loc.key.as_deref(), Some("a//"));
        assert_eq!(loc.scope().key.as_deref(), Some("a/"));
        assert_eq!(loc.scope().list_prefix().as_deref(), Some("a//"));
    }
}
