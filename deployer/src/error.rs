use cloud::{EnvironmentStatus, ProviderError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a deployment
#[derive(Error, Debug)]
pub enum DeployError {
    /// Missing or conflicting configuration, detected before any network call
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Config file could not be read or parsed
    #[error("Failed to load config file {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },

    /// The local code package could not be read
    #[error("Error reading specified package \"{}\"", path.display())]
    PackageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A provider call failed; the provider error is kept as the source
    #[error("{context}")]
    Provider {
        context: String,
        #[source]
        source: ProviderError,
    },

    /// The environment exists but cannot take an update right now
    #[error("Environment is currently not in \"Ready\" status (currently \"{status}\"). Please resolve/wait and try again.")]
    EnvironmentNotReady {
        environment: String,
        status: EnvironmentStatus,
    },
}

impl DeployError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        DeployError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn provider(context: impl Into<String>, source: ProviderError) -> Self {
        DeployError::Provider {
            context: context.into(),
            source,
        }
    }

    /// The error followed by every underlying cause, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut lines = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            lines.push(cause.to_string());
            source = cause.source();
        }
        lines
    }
}

pub type DeployResult<T> = Result<T, DeployError>;
