//! CloudWatch Logs backend on the AWS SDK.
//!
//! The SDK is async; the backend owns a small tokio runtime and blocks on it,
//! so callers (rayon workers in particular) stay synchronous. SDK-level retry
//! is disabled: [`Client`](crate::Client) applies its own [`RetryConfig`](crate::RetryConfig)
//! on top of the error categories produced here.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{LogGroup, SubscriptionFilter};
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig as SdkRetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatchlogs::operation::create_log_group::CreateLogGroupError;
use aws_sdk_cloudwatchlogs::operation::describe_log_groups::DescribeLogGroupsError;
use aws_sdk_cloudwatchlogs::operation::describe_subscription_filters::DescribeSubscriptionFiltersError;
use aws_sdk_cloudwatchlogs::operation::put_subscription_filter::PutSubscriptionFilterError;
use aws_sdk_cloudwatchlogs::types as sdk;
use std::fmt;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Threads driving SDK I/O. Callers block, so a couple is plenty.
const RUNTIME_THREADS: usize = 2;

/// Connection settings for [`SdkBackend::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkSettings {
    /// Region to call; the default provider chain decides when unset
    pub region: Option<String>,
    /// Named profile from the shared config files
    pub profile: Option<String>,
    /// Per-request read timeout; expiry surfaces as a network error
    pub read_timeout: Option<Duration>,
}

/// Backend that calls CloudWatch Logs through `aws-sdk-cloudwatchlogs`.
pub struct SdkBackend {
    client: aws_sdk_cloudwatchlogs::Client,
    runtime: Runtime,
}

impl fmt::Debug for SdkBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkBackend")
            .field("region", &self.client.config().region())
            .finish_non_exhaustive()
    }
}

impl SdkBackend {
    /// Load credentials and region from the default provider chain.
    ///
    /// Credentials are resolved lazily, on the first call.
    pub fn connect(settings: &SdkSettings) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("logkit-sdk")
            .enable_all()
            .build()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(SdkRetryConfig::disabled());
        if let Some(region) = &settings.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(timeout) = settings.read_timeout {
            loader = loader.timeout_config(TimeoutConfig::builder().read_timeout(timeout).build());
        }

        let sdk_config = runtime.block_on(loader.load());
        log::debug!(
            "CloudWatch Logs client for region {}",
            sdk_config
                .region()
                .map_or_else(|| "<default>".to_string(), ToString::to_string)
        );

        Ok(Self {
            client: aws_sdk_cloudwatchlogs::Client::new(&sdk_config),
            runtime,
        })
    }

    async fn list_log_groups(&self, prefix: &str) -> Result<Vec<LogGroup>> {
        let mut groups = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .describe_log_groups()
                .log_group_name_prefix(prefix)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(describe_log_groups_error)?;

            groups.extend(output.log_groups().iter().filter_map(convert_log_group));
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(groups);
            }
        }
    }

    async fn list_subscription_filters(&self, log_group: &str) -> Result<Vec<SubscriptionFilter>> {
        let mut filters = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .describe_subscription_filters()
                .log_group_name(log_group)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| describe_subscription_filters_error(e, log_group))?;

            filters.extend(
                output
                    .subscription_filters()
                    .iter()
                    .map(|f| convert_filter(f, log_group)),
            );
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(filters);
            }
        }
    }

    async fn create(&self, name: &str) -> Result<()> {
        self.client
            .create_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(|e| create_log_group_error(e, name))?;
        Ok(())
    }

    async fn put_filter(
        &self,
        log_group: &str,
        filter_name: &str,
        destination_arn: &str,
        filter_pattern: &str,
    ) -> Result<()> {
        self.client
            .put_subscription_filter()
            .log_group_name(log_group)
            .filter_name(filter_name)
            .destination_arn(destination_arn)
            .filter_pattern(filter_pattern)
            .send()
            .await
            .map_err(|e| put_subscription_filter_error(e, log_group))?;
        Ok(())
    }
}

impl Backend for SdkBackend {
    fn describe_log_groups(&self, prefix: &str) -> Result<Vec<LogGroup>> {
        self.runtime.block_on(self.list_log_groups(prefix))
    }

    fn create_log_group(&self, name: &str) -> Result<()> {
        self.runtime.block_on(self.create(name))
    }

    fn describe_subscription_filters(&self, log_group: &str) -> Result<Vec<SubscriptionFilter>> {
        self.runtime.block_on(self.list_subscription_filters(log_group))
    }

    fn put_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
        destination_arn: &str,
        filter_pattern: &str,
    ) -> Result<()> {
        self.runtime
            .block_on(self.put_filter(log_group, filter_name, destination_arn, filter_pattern))
    }
}

fn convert_log_group(group: &sdk::LogGroup) -> Option<LogGroup> {
    Some(LogGroup {
        log_group_name: group.log_group_name()?.to_string(),
        arn: group.arn().map(str::to_string),
        creation_time: group.creation_time(),
        retention_in_days: group.retention_in_days().and_then(|d| u32::try_from(d).ok()),
    })
}

fn convert_filter(filter: &sdk::SubscriptionFilter, log_group: &str) -> SubscriptionFilter {
    SubscriptionFilter::new(
        filter.filter_name().unwrap_or_default(),
        filter.log_group_name().unwrap_or(log_group),
        filter.destination_arn().unwrap_or_default(),
        filter.filter_pattern().unwrap_or_default(),
    )
}

fn describe_log_groups_error<R: fmt::Debug>(err: SdkError<DescribeLogGroupsError, R>) -> Error {
    classify("DescribeLogGroups", err, |e| match e {
        DescribeLogGroupsError::ServiceUnavailableException(inner) => Some(Error::Network {
            message: inner.to_string(),
        }),
        _ => None,
    })
}

fn create_log_group_error<R: fmt::Debug>(
    err: SdkError<CreateLogGroupError, R>,
    name: &str,
) -> Error {
    classify("CreateLogGroup", err, |e| match e {
        CreateLogGroupError::ResourceAlreadyExistsException(_) => Some(Error::AlreadyExists {
            name: name.to_string(),
        }),
        CreateLogGroupError::LimitExceededException(inner) => Some(Error::LimitExceeded {
            message: inner.to_string(),
        }),
        CreateLogGroupError::OperationAbortedException(inner) => Some(Error::Throttled {
            message: inner.to_string(),
        }),
        CreateLogGroupError::ServiceUnavailableException(inner) => Some(Error::Network {
            message: inner.to_string(),
        }),
        _ => None,
    })
}

fn describe_subscription_filters_error<R: fmt::Debug>(
    err: SdkError<DescribeSubscriptionFiltersError, R>,
    log_group: &str,
) -> Error {
    classify("DescribeSubscriptionFilters", err, |e| match e {
        DescribeSubscriptionFiltersError::ResourceNotFoundException(_) => Some(Error::NotFound {
            name: log_group.to_string(),
        }),
        DescribeSubscriptionFiltersError::ServiceUnavailableException(inner) => {
            Some(Error::Network {
                message: inner.to_string(),
            })
        }
        _ => None,
    })
}

fn put_subscription_filter_error<R: fmt::Debug>(
    err: SdkError<PutSubscriptionFilterError, R>,
    log_group: &str,
) -> Error {
    classify("PutSubscriptionFilter", err, |e| match e {
        PutSubscriptionFilterError::ResourceNotFoundException(_) => Some(Error::NotFound {
            name: log_group.to_string(),
        }),
        PutSubscriptionFilterError::LimitExceededException(inner) => Some(Error::LimitExceeded {
            message: inner.to_string(),
        }),
        PutSubscriptionFilterError::OperationAbortedException(inner) => Some(Error::Throttled {
            message: inner.to_string(),
        }),
        PutSubscriptionFilterError::ServiceUnavailableException(inner) => Some(Error::Network {
            message: inner.to_string(),
        }),
        _ => None,
    })
}

/// Map an SDK error onto an error category.
///
/// `typed` handles the exceptions the operation models. Throttling and
/// credential failures are not modeled per operation and are recognized by
/// their error code; timeouts and connection failures by the SDK error kind.
fn classify<E, R>(
    operation: &'static str,
    err: SdkError<E, R>,
    typed: impl FnOnce(&E) -> Option<Error>,
) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) => return Error::Network { message },
        SdkError::DispatchFailure(failure) if failure.is_io() || failure.is_timeout() => {
            return Error::Network { message };
        }
        _ => {}
    }

    let Some(service_error) = err.as_service_error() else {
        return Error::Service {
            operation,
            code: None,
            message,
        };
    };
    if let Some(mapped) = typed(service_error) {
        return mapped;
    }

    match service_error.code() {
        Some(
            "ThrottlingException"
            | "Throttling"
            | "TooManyRequestsException"
            | "RequestLimitExceeded",
        ) => Error::Throttled { message },
        Some(
            "AccessDeniedException"
            | "UnrecognizedClientException"
            | "ExpiredTokenException"
            | "InvalidSignatureException",
        ) => Error::AccessDenied { message },
        code => Error::Service {
            operation,
            code: code.map(str::to_string),
            message,
        },
    }
}
