pub mod config;
pub mod provider;
pub mod types;

#[cfg(feature = "aws")]
pub mod aws;

pub use config::AwsConfig;
pub use provider::{EnvironmentManager, ObjectStorage, ProviderError, ProviderResult};
pub use types::{
    ApplicationVersion, CreateApplicationVersionRequest, CreateEnvironmentRequest,
    EnvironmentDescription, EnvironmentStatus, EnvironmentTier, OptionSetting, Platform,
    PutObjectRequest, SourceBundle, Tag, UpdateEnvironmentRequest, UploadReceipt,
};

#[cfg(feature = "aws")]
pub use aws::{AwsClients, BeanstalkManager, S3Storage};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::provider::*;
    pub use crate::types::*;

    #[cfg(feature = "aws")]
    pub use crate::aws::*;
}
