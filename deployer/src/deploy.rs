//! Deployment workflow.
//!
//! ```text
//! head bucket ──404──> create bucket ─┐
//!      │ok                            v
//!      └──────────────────────> upload package
//!                                     │
//!            describe versions ──none──> create version
//!                                     │
//!            describe environments ─┬─ absent ──> create environment
//!                                   ├─ Ready  ──> update environment
//!                                   └─ other  ──> fail
//! ```
//!
//! Every step awaits the previous one and the first failure ends the run.

use crate::config::DeploymentConfig;
use crate::error::{DeployError, DeployResult};
use crate::params::{DeploymentParameters, LookupKeys};
use chrono::{DateTime, Utc};
use cloud::{
    ApplicationVersion, EnvironmentDescription, EnvironmentManager, ObjectStorage,
    PutObjectRequest, UploadReceipt,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receives one human-readable line per workflow event.
pub type StatusLogger = Arc<dyn Fn(&str) + Send + Sync>;

pub fn stdout_logger() -> StatusLogger {
    Arc::new(|line: &str| println!("{}", line))
}

pub fn silent_logger() -> StatusLogger {
    Arc::new(|_: &str| {})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketAction {
    Existing,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionAction {
    Existing,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentAction {
    Create,
    Update,
}

/// What a successful run did, plus the provider's final environment view.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    pub bucket: BucketAction,
    pub upload: UploadReceipt,
    pub application_version: VersionAction,
    pub environment_action: EnvironmentAction,
    pub environment: EnvironmentDescription,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Read-only snapshot used by `deployer status`.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStatus {
    pub bucket_exists: bool,
    pub application_version: Option<ApplicationVersion>,
    pub environment: Option<EnvironmentDescription>,
}

/// Absent environments are created, `Ready` ones updated; anything else
/// fails without touching the environment.
pub fn plan_environment_action(
    environment_name: &str,
    existing: &[EnvironmentDescription],
) -> DeployResult<EnvironmentAction> {
    match existing.first() {
        None => Ok(EnvironmentAction::Create),
        Some(env) if env.status.is_ready() => Ok(EnvironmentAction::Update),
        Some(env) => Err(DeployError::EnvironmentNotReady {
            environment: environment_name.to_string(),
            status: env.status.clone(),
        }),
    }
}

pub struct Deployer {
    params: DeploymentParameters,
    code_package: PathBuf,
    storage: Arc<dyn ObjectStorage>,
    environments: Arc<dyn EnvironmentManager>,
    logger: StatusLogger,
}

impl Deployer {
    /// Validates `config` and wires in pre-built clients.
    pub fn with_clients(
        config: DeploymentConfig,
        storage: Arc<dyn ObjectStorage>,
        environments: Arc<dyn EnvironmentManager>,
    ) -> DeployResult<Self> {
        let params = DeploymentParameters::from_config(&config)?;
        debug!(
            params = %serde_json::to_string(&params).unwrap_or_default(),
            storage = storage.provider_name(),
            environments = environments.provider_name(),
            "Deployment parameters derived"
        );

        Ok(Self {
            params,
            code_package: config.code_package,
            storage,
            environments,
            logger: stdout_logger(),
        })
    }

    /// Validates `config`, then builds AWS clients from its connection settings.
    pub async fn connect(config: DeploymentConfig) -> DeployResult<Self> {
        DeploymentParameters::from_config(&config)?;
        let (storage, environments) = connect_clients(&config).await?;
        Self::with_clients(config, storage, environments)
    }

    pub fn with_logger(mut self, logger: StatusLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn params(&self) -> &DeploymentParameters {
        &self.params
    }

    fn log(&self, message: &str) {
        info!("{}", message);
        (self.logger)(message);
    }

    /// Runs the whole workflow. Failures are reported through the logger
    /// before being returned.
    pub async fn deploy(&self) -> DeployResult<DeploymentOutcome> {
        let started_at = Utc::now();
        info!(
            application = %self.params.application_name,
            environment = %self.params.environment_name,
            version = %self.params.version_label,
            "Starting deployment"
        );

        match self.run(started_at).await {
            Ok(outcome) => {
                self.log(&format!(
                    "Deployment of \"{}\" version \"{}\" to \"{}\" submitted ({:?}).",
                    self.params.application_name,
                    self.params.version_label,
                    self.params.environment_name,
                    outcome.environment_action
                ));
                Ok(outcome)
            }
            Err(err) => {
                self.report_failure(&err);
                Err(err)
            }
        }
    }

    async fn run(&self, started_at: DateTime<Utc>) -> DeployResult<DeploymentOutcome> {
        let bucket = self.ensure_bucket().await?;
        let upload = self.upload_package().await?;
        let application_version = self.ensure_application_version().await?;
        let (environment_action, environment) = self.create_or_update_environment().await?;

        Ok(DeploymentOutcome {
            bucket,
            upload,
            application_version,
            environment_action,
            environment,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn report_failure(&self, err: &DeployError) {
        let chain = err.chain();
        error!(error = %err, causes = ?&chain[1..], "Deployment failed");

        (self.logger)(&format!("Deployment failed: {}", chain[0]));
        for cause in &chain[1..] {
            (self.logger)(&format!("  caused by: {}", cause));
        }
    }

    async fn ensure_bucket(&self) -> DeployResult<BucketAction> {
        let bucket = self.params.bucket();
        self.log(&format!("Checking for S3 bucket \"{}\"...", bucket));

        let exists = self.storage.bucket_exists(bucket).await.map_err(|e| {
            DeployError::provider(
                format!(
                    "Checking S3 bucket \"{}\" failed. Check your AWS credentials and permissions.",
                    bucket
                ),
                e,
            )
        })?;

        if exists {
            self.log(&format!("S3 bucket \"{}\" exists.", bucket));
            return Ok(BucketAction::Existing);
        }

        self.log(&format!("S3 bucket \"{}\" does not exist.", bucket));
        self.log(&format!("Creating S3 bucket \"{}\"...", bucket));
        self.storage.create_bucket(bucket).await.map_err(|e| {
            DeployError::provider(format!("Create S3 bucket \"{}\" failed.", bucket), e)
        })?;

        Ok(BucketAction::Created)
    }

    async fn upload_package(&self) -> DeployResult<UploadReceipt> {
        self.log(&format!(
            "Uploading code to S3 bucket \"{}\"...",
            self.params.bucket()
        ));

        let body = tokio::fs::read(&self.code_package)
            .await
            .map_err(|source| DeployError::PackageRead {
                path: self.code_package.clone(),
                source,
            })?;
        debug!(bytes = body.len(), key = %self.params.key(), "Package read");

        let request = PutObjectRequest::new(self.params.bucket(), self.params.key(), body);
        self.storage.put_object(request).await.map_err(|e| {
            DeployError::provider(
                format!(
                    "Upload of \"{}\" to S3 bucket \"{}\" failed.",
                    self.code_package.display(),
                    self.params.bucket()
                ),
                e,
            )
        })
    }

    async fn ensure_application_version(&self) -> DeployResult<VersionAction> {
        let app = &self.params.application_name;
        let version = &self.params.version_label;
        self.log(&format!(
            "Checking for application \"{}\" version \"{}\"...",
            app, version
        ));

        let existing = self
            .environments
            .describe_application_versions(app, version)
            .await
            .map_err(|e| {
                DeployError::provider(
                    "Checking application versions failed. Check your AWS credentials and permissions.",
                    e,
                )
            })?;

        if !existing.is_empty() {
            warn!(
                application = %app,
                version = %version,
                "Application version already exists, reusing it"
            );
            self.log(&format!(
                "Application \"{}\" version \"{}\" already exists; skipping creation.",
                app, version
            ));
            return Ok(VersionAction::Existing);
        }

        self.log(&format!(
            "Creating application \"{}\" version \"{}\"...",
            app, version
        ));
        self.environments
            .create_application_version(self.params.create_application_version_request())
            .await
            .map_err(|e| {
                DeployError::provider(
                    "Create application version failed. Check your iam:PassRole permissions.",
                    e,
                )
            })?;

        Ok(VersionAction::Created)
    }

    async fn create_or_update_environment(
        &self,
    ) -> DeployResult<(EnvironmentAction, EnvironmentDescription)> {
        let env_name = &self.params.environment_name;
        self.log(&format!("Checking for environment \"{}\"...", env_name));

        let existing = self
            .environments
            .describe_environments(&self.params.application_name, env_name)
            .await
            .map_err(|e| {
                DeployError::provider(
                    "Checking environments failed. Check your AWS credentials and permissions.",
                    e,
                )
            })?;

        match plan_environment_action(env_name, &existing)? {
            EnvironmentAction::Create => {
                self.log(&format!("Creating environment \"{}\"...", env_name));
                let env = self
                    .environments
                    .create_environment(self.params.create_environment_request())
                    .await
                    .map_err(|e| {
                        DeployError::provider(
                            "Create environment failed. Check your iam:PassRole permissions.",
                            e,
                        )
                    })?;
                self.log(&format!(
                    "Environment \"{}\" created and is now being launched.",
                    env_name
                ));
                Ok((EnvironmentAction::Create, env))
            }
            EnvironmentAction::Update => {
                self.log(&format!("Updating environment \"{}\"...", env_name));
                let env = self
                    .environments
                    .update_environment(self.params.update_environment_request())
                    .await
                    .map_err(|e| {
                        DeployError::provider(
                            "Update environment failed. Check your iam:PassRole permissions.",
                            e,
                        )
                    })?;
                self.log(&format!(
                    "Environment \"{}\" updated and is now being launched.",
                    env_name
                ));
                Ok((EnvironmentAction::Update, env))
            }
        }
    }

    /// Looks up bucket, version and environment without changing anything.
    pub async fn status(&self) -> DeployResult<DeploymentStatus> {
        lookup_status(
            &self.params.lookup_keys(),
            self.storage.as_ref(),
            self.environments.as_ref(),
        )
        .await
    }
}

/// Read-only status lookup that only needs the resource names, not a
/// deployable platform.
pub struct StatusQuery {
    keys: LookupKeys,
    storage: Arc<dyn ObjectStorage>,
    environments: Arc<dyn EnvironmentManager>,
}

impl StatusQuery {
    pub fn with_clients(
        config: &DeploymentConfig,
        storage: Arc<dyn ObjectStorage>,
        environments: Arc<dyn EnvironmentManager>,
    ) -> DeployResult<Self> {
        Ok(Self {
            keys: LookupKeys::from_config(config)?,
            storage,
            environments,
        })
    }

    pub async fn connect(config: &DeploymentConfig) -> DeployResult<Self> {
        LookupKeys::from_config(config)?;
        let (storage, environments) = connect_clients(config).await?;
        Self::with_clients(config, storage, environments)
    }

    pub fn keys(&self) -> &LookupKeys {
        &self.keys
    }

    pub async fn run(&self) -> DeployResult<DeploymentStatus> {
        lookup_status(&self.keys, self.storage.as_ref(), self.environments.as_ref()).await
    }
}

async fn connect_clients(
    config: &DeploymentConfig,
) -> DeployResult<(Arc<dyn ObjectStorage>, Arc<dyn EnvironmentManager>)> {
    let clients = cloud::AwsClients::connect(&config.aws)
        .await
        .map_err(|e| DeployError::provider("Failed to configure AWS clients.", e))?;

    Ok((Arc::new(clients.storage), Arc::new(clients.environments)))
}

async fn lookup_status(
    keys: &LookupKeys,
    storage: &dyn ObjectStorage,
    environments: &dyn EnvironmentManager,
) -> DeployResult<DeploymentStatus> {
    let bucket_exists = storage
        .bucket_exists(&keys.bucket)
        .await
        .map_err(|e| DeployError::provider("Checking S3 bucket failed.", e))?;

    let application_version = environments
        .describe_application_versions(&keys.application_name, &keys.version_label)
        .await
        .map_err(|e| DeployError::provider("Checking application versions failed.", e))?
        .into_iter()
        .next();

    let environment = environments
        .describe_environments(&keys.application_name, &keys.environment_name)
        .await
        .map_err(|e| DeployError::provider("Checking environments failed.", e))?
        .into_iter()
        .next();

    Ok(DeploymentStatus {
        bucket_exists,
        application_version,
        environment,
    })
}
