use crate::types::{
    ApplicationVersion, CreateApplicationVersionRequest, CreateEnvironmentRequest,
    EnvironmentDescription, PutObjectRequest, UpdateEnvironmentRequest, UploadReceipt,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{operation} failed{}: {message}", http_suffix(.status))]
    Api {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Credentials error: {message}")]
    Credentials { message: String },
}

impl ProviderError {
    pub fn api(operation: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        ProviderError::Api {
            operation,
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Bucket and object operations needed to stage a code package.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns `Ok(false)` when the provider answers "not found"; every other
    /// failure is an error.
    async fn bucket_exists(&self, bucket: &str) -> ProviderResult<bool>;

    async fn create_bucket(&self, bucket: &str) -> ProviderResult<()>;

    async fn put_object(&self, request: PutObjectRequest) -> ProviderResult<UploadReceipt>;

    fn provider_name(&self) -> &'static str;
}

/// Application version and environment operations of the hosting service.
#[async_trait]
pub trait EnvironmentManager: Send + Sync {
    async fn describe_environments(
        &self,
        application_name: &str,
        environment_name: &str,
    ) -> ProviderResult<Vec<EnvironmentDescription>>;

    async fn create_environment(
        &self,
        request: CreateEnvironmentRequest,
    ) -> ProviderResult<EnvironmentDescription>;

    async fn update_environment(
        &self,
        request: UpdateEnvironmentRequest,
    ) -> ProviderResult<EnvironmentDescription>;

    async fn describe_application_versions(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> ProviderResult<Vec<ApplicationVersion>>;

    async fn create_application_version(
        &self,
        request: CreateApplicationVersionRequest,
    ) -> ProviderResult<ApplicationVersion>;

    fn provider_name(&self) -> &'static str;
}
