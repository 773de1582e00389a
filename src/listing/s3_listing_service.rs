use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::{ListingError, Result};
use super::types::{ListRequest, ListResponse, ListedObject, ListedPrefix, ListingService};

const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER_NAME: &str = "s3idx-static";

/// An access key / secret key pair supplied by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Connection settings for [`S3ListingService`].
#[derive(Debug, Clone, Default)]
pub struct S3ListingConfig {
    /// Custom endpoint URL (MinIO, LocalStack, other S3-compatible services).
    pub endpoint_url: Option<String>,
    /// Region override; falls back to the environment, then `us-east-1`.
    pub region: Option<String>,
    /// Credentials; when absent, requests are sent unsigned.
    pub credentials: Option<StaticCredentials>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub force_path_style: bool,
}

impl S3ListingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.credentials = Some(StaticCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        });
        self
    }

    pub fn with_force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }
}

/// Lists objects through the AWS SDK.
///
/// Credentials are passed through untouched; without them every request is
/// anonymous, which is what public buckets expect.
#[derive(Clone)]
pub struct S3ListingService {
    client: Client,
}

impl S3ListingService {
    pub async fn new(config: S3ListingConfig) -> Self {
        let region = RegionProviderChain::first_try(config.region.clone().map(aws_config::Region::new))
            .or_default_provider()
            .or_else(DEFAULT_REGION);

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader = match &config.credentials {
            Some(creds) => loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            )),
            None => loader.no_credentials(),
        };

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ListingService for S3ListingService {
    async fn list_objects(&self, request: &ListRequest) -> Result<ListResponse> {
        let mut call = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .max_keys(i32::try_from(request.max_keys).unwrap_or(i32::MAX))
            .delimiter(&request.delimiter);

        if let Some(prefix) = &request.prefix {
            call = call.prefix(prefix);
        }
        if let Some(token) = &request.continuation_token {
            call = call.continuation_token(token);
        }

        debug!(params = ?request.query_pairs(), "ListObjectsV2");
        let output = call
            .send()
            .await
            .map_err(|err| map_sdk_error(&request.bucket, err))?;

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .map(|cp| ListedPrefix {
                prefix: cp.prefix().map(str::to_string),
            })
            .collect();

        let contents = output
            .contents()
            .iter()
            .map(|obj| ListedObject {
                key: obj.key().map(str::to_string),
                last_modified: obj.last_modified().and_then(to_chrono),
                size: obj.size(),
            })
            .collect();

        Ok(ListResponse {
            common_prefixes,
            contents,
            truncated: output.is_truncated().unwrap_or(false),
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn map_sdk_error<E, R>(bucket: &str, err: SdkError<E, R>) -> ListingError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let inner = service_err.err();
            let code = inner.code().unwrap_or("Unknown").to_string();
            let message = inner.message().unwrap_or_default().to_string();
            match code.as_str() {
                "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch" => ListingError::AccessDenied {
                    bucket: bucket.to_string(),
                    message,
                },
                "NoSuchBucket" => ListingError::NoSuchBucket(bucket.to_string()),
                _ => ListingError::Service { code, message },
            }
        }
        _ => ListingError::Transport(DisplayErrorContext(&err).to_string()),
    }
}
