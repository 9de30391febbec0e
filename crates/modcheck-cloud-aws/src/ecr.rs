//! ECR repository describer
//!
//! Looks a repository up with `DescribeRepositories` and maps the SDK's
//! error model onto [`DescribeError`]: service errors keep their error code,
//! anything that never reached the service (timeouts, dispatch and
//! credential failures) is carried as an unknown error.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_ecr::config::Region;
use aws_sdk_ecr::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ecr::operation::describe_repositories::DescribeRepositoriesError;
use aws_sdk_ecr::types::Repository;
use modcheck_core::{DescribeError, ResourceDescriber, ResourceRecord};
use std::time::Duration;

/// Default upper bound for one `DescribeRepositories` call, retries included
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Code reported when a service error carries none
const UNKNOWN_CODE: &str = "Unknown";

/// How to build the ECR client
#[derive(Debug, Clone)]
pub struct AwsClientConfig {
    pub region: String,
    /// Named profile from the shared AWS config; the default chain otherwise
    pub profile: Option<String>,
    pub operation_timeout: Duration,
}

impl AwsClientConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            profile: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// [`ResourceDescriber`] backed by the ECR `DescribeRepositories` API
#[derive(Debug, Clone)]
pub struct EcrDescriber {
    client: aws_sdk_ecr::Client,
    region: String,
}

impl EcrDescriber {
    /// Resolve credentials from the default chain and build the client
    pub async fn connect(config: &AwsClientConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.operation_timeout)
                    .build(),
            );
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        tracing::debug!(
            "ECR client ready (region: {}, profile: {})",
            config.region,
            config.profile.as_deref().unwrap_or("default")
        );

        Self::from_client(aws_sdk_ecr::Client::new(&sdk_config), &config.region)
    }

    /// Wrap an already configured client
    pub fn from_client(client: aws_sdk_ecr::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl ResourceDescriber for EcrDescriber {
    fn name(&self) -> &str {
        "aws-ecr"
    }

    async fn describe(&self, identifier: &str) -> Result<Vec<ResourceRecord>, DescribeError> {
        tracing::debug!(
            "DescribeRepositories {} in {}",
            identifier,
            self.region
        );

        let output = self
            .client
            .describe_repositories()
            .repository_names(identifier)
            .send()
            .await
            .map_err(describe_error)?;

        Ok(output.repositories().iter().map(record_from).collect())
    }
}

/// Map an SDK failure onto the describer error model
pub fn describe_error<R>(err: SdkError<DescribeRepositoriesError, R>) -> DescribeError
where
    R: std::fmt::Debug,
{
    match err {
        SdkError::ServiceError(context) => service_error(context.err()),
        other => DescribeError::Unknown(DisplayErrorContext(&other).to_string()),
    }
}

/// Service-side error with its code. Modeled variants built without
/// metadata still report their shape name.
pub fn service_error(err: &DescribeRepositoriesError) -> DescribeError {
    let code = match err.code() {
        Some(code) => code.to_string(),
        None if err.is_repository_not_found_exception() => {
            "RepositoryNotFoundException".to_string()
        }
        None if err.is_invalid_parameter_exception() => "InvalidParameterException".to_string(),
        None if err.is_server_exception() => "ServerException".to_string(),
        None => UNKNOWN_CODE.to_string(),
    };
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(err).to_string());
    DescribeError::provider(code, message)
}

/// Flatten an ECR repository into a [`ResourceRecord`]
pub fn record_from(repository: &Repository) -> ResourceRecord {
    let mut record = ResourceRecord::new(repository.repository_name().unwrap_or_default());

    if let Some(arn) = repository.repository_arn() {
        record = record.with_arn(arn);
    }
    if let Some(uri) = repository.repository_uri() {
        record = record.with_uri(uri);
    }
    if let Some(registry_id) = repository.registry_id() {
        record = record.with_owner_id(registry_id);
    }
    if let Some(created_at) = repository.created_at()
        && let Some(ts) =
            chrono::DateTime::from_timestamp(created_at.secs(), created_at.subsec_nanos())
    {
        record = record.with_created_at(ts);
    }
    if let Some(mutability) = repository.image_tag_mutability() {
        record = record.with_attribute("image_tag_mutability", mutability.as_str());
    }
    if let Some(scan) = repository.image_scanning_configuration() {
        record = record.with_attribute("scan_on_push", scan.scan_on_push().to_string());
    }

    record
}
