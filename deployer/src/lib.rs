pub mod config;
pub mod deploy;
pub mod error;
pub mod params;

pub use config::{DeploymentConfig, Tier, DEFAULT_VERSION};
pub use deploy::{
    plan_environment_action, silent_logger, stdout_logger, BucketAction, Deployer,
    DeploymentOutcome, DeploymentStatus, EnvironmentAction, StatusLogger, StatusQuery,
    VersionAction,
};
pub use error::{DeployError, DeployResult};
pub use params::{DeploymentParameters, LookupKeys};
