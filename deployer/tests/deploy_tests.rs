//! Workflow tests against a recording in-memory cloud.

use async_trait::async_trait;
use cloud::{
    ApplicationVersion, CreateApplicationVersionRequest, CreateEnvironmentRequest,
    EnvironmentDescription, EnvironmentManager, EnvironmentStatus, ObjectStorage, ProviderError,
    ProviderResult, PutObjectRequest, SourceBundle, UpdateEnvironmentRequest, UploadReceipt,
};
use deployer::{
    BucketAction, DeployError, Deployer, DeploymentConfig, EnvironmentAction, StatusLogger,
    StatusQuery, Tier, VersionAction,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const PACKAGE_BYTES: &[u8] = b"PK\x03\x04 fake zip payload";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    HeadBucket(String),
    CreateBucket(String),
    PutObject {
        bucket: String,
        key: String,
        size: usize,
        content_type: String,
    },
    DescribeVersions(String, String),
    CreateVersion {
        application: String,
        version: String,
        bundle: SourceBundle,
        auto_create: bool,
    },
    DescribeEnvironments(String, String),
    CreateEnvironment {
        environment: String,
        version: String,
        tier_type: String,
        tags: usize,
    },
    UpdateEnvironment {
        environment: String,
        version: String,
    },
}

#[derive(Clone, Copy)]
enum BucketState {
    Present,
    Missing,
    Failing(u16),
}

struct FakeCloud {
    bucket: BucketState,
    version_exists: bool,
    environment: Option<EnvironmentStatus>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    fn new(
        bucket: BucketState,
        version_exists: bool,
        environment: Option<EnvironmentStatus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bucket,
            version_exists,
            environment,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }
}

#[async_trait]
impl ObjectStorage for FakeCloud {
    async fn bucket_exists(&self, bucket: &str) -> ProviderResult<bool> {
        self.record(Call::HeadBucket(bucket.to_string()));
        match self.bucket {
            BucketState::Present => Ok(true),
            BucketState::Missing => Ok(false),
            BucketState::Failing(status) => {
                Err(ProviderError::api("HeadBucket", Some(status), "Forbidden"))
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> ProviderResult<()> {
        self.record(Call::CreateBucket(bucket.to_string()));
        Ok(())
    }

    async fn put_object(&self, request: PutObjectRequest) -> ProviderResult<UploadReceipt> {
        self.record(Call::PutObject {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            size: request.body.len(),
            content_type: request.content_type.clone(),
        });
        Ok(UploadReceipt {
            bucket: request.bucket,
            key: request.key,
            size: request.body.len(),
            e_tag: Some("\"etag\"".to_string()),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[async_trait]
impl EnvironmentManager for FakeCloud {
    async fn describe_environments(
        &self,
        application_name: &str,
        environment_name: &str,
    ) -> ProviderResult<Vec<EnvironmentDescription>> {
        self.record(Call::DescribeEnvironments(
            application_name.to_string(),
            environment_name.to_string(),
        ));
        Ok(self
            .environment
            .clone()
            .map(|status| vec![EnvironmentDescription::new(environment_name, status)])
            .unwrap_or_default())
    }

    async fn create_environment(
        &self,
        request: CreateEnvironmentRequest,
    ) -> ProviderResult<EnvironmentDescription> {
        self.record(Call::CreateEnvironment {
            environment: request.environment_name.clone(),
            version: request.version_label.clone(),
            tier_type: request.tier.tier_type.clone(),
            tags: request.tags.len(),
        });
        let mut env =
            EnvironmentDescription::new(request.environment_name, EnvironmentStatus::Launching);
        env.version_label = Some(request.version_label);
        Ok(env)
    }

    async fn update_environment(
        &self,
        request: UpdateEnvironmentRequest,
    ) -> ProviderResult<EnvironmentDescription> {
        self.record(Call::UpdateEnvironment {
            environment: request.environment_name.clone(),
            version: request.version_label.clone(),
        });
        let mut env =
            EnvironmentDescription::new(request.environment_name, EnvironmentStatus::Updating);
        env.version_label = Some(request.version_label);
        Ok(env)
    }

    async fn describe_application_versions(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> ProviderResult<Vec<ApplicationVersion>> {
        self.record(Call::DescribeVersions(
            application_name.to_string(),
            version_label.to_string(),
        ));
        if self.version_exists {
            Ok(vec![ApplicationVersion {
                application_name: application_name.to_string(),
                version_label: version_label.to_string(),
                source_bundle: None,
                status: Some("PROCESSED".to_string()),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn create_application_version(
        &self,
        request: CreateApplicationVersionRequest,
    ) -> ProviderResult<ApplicationVersion> {
        self.record(Call::CreateVersion {
            application: request.application_name.clone(),
            version: request.version_label.clone(),
            bundle: request.source_bundle.clone(),
            auto_create: request.auto_create_application,
        });
        Ok(ApplicationVersion {
            application_name: request.application_name,
            version_label: request.version_label,
            source_bundle: Some(request.source_bundle),
            status: Some("UNPROCESSED".to_string()),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

fn package_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let build = dir.path().join("build");
    std::fs::create_dir_all(&build).unwrap();
    let package = build.join("foo.zip");
    std::fs::write(&package, PACKAGE_BYTES).unwrap();
    (dir, package)
}

fn foo_config(package: &Path) -> DeploymentConfig {
    DeploymentConfig::new("foo", package)
        .with_env_name("foo-env")
        .with_version("2.0.0")
        .with_solution_stack("64bit Amazon Linux 2023 v6.1.0 running Node.js 20")
}

fn capture_logger() -> (StatusLogger, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let logger: StatusLogger =
        Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()));
    (logger, lines)
}

fn build_deployer(
    cloud: &Arc<FakeCloud>,
    config: DeploymentConfig,
) -> Result<Deployer, DeployError> {
    let (logger, _) = capture_logger();
    Deployer::with_clients(config, cloud.clone(), cloud.clone()).map(|d| d.with_logger(logger))
}

fn calls_through_new_version() -> Vec<Call> {
    vec![
        Call::HeadBucket("foo".to_string()),
        Call::CreateBucket("foo".to_string()),
        Call::PutObject {
            bucket: "foo".to_string(),
            key: "2.0.0-foo.zip".to_string(),
            size: PACKAGE_BYTES.len(),
            content_type: "binary/octet-stream".to_string(),
        },
        Call::DescribeVersions("foo".to_string(), "2.0.0".to_string()),
        Call::CreateVersion {
            application: "foo".to_string(),
            version: "2.0.0".to_string(),
            bundle: SourceBundle {
                s3_bucket: "foo".to_string(),
                s3_key: "2.0.0-foo.zip".to_string(),
            },
            auto_create: true,
        },
        Call::DescribeEnvironments("foo".to_string(), "foo-env".to_string()),
    ]
}

#[tokio::test]
async fn test_fresh_deployment() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, None);

    let outcome = build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .deploy()
        .await
        .unwrap();

    let mut expected = calls_through_new_version();
    expected.push(Call::CreateEnvironment {
        environment: "foo-env".to_string(),
        version: "2.0.0".to_string(),
        tier_type: "Standard".to_string(),
        tags: 0,
    });
    assert_eq!(cloud.calls(), expected);

    assert_eq!(outcome.bucket, BucketAction::Created);
    assert_eq!(outcome.application_version, VersionAction::Created);
    assert_eq!(outcome.environment_action, EnvironmentAction::Create);
    assert_eq!(outcome.upload.key, "2.0.0-foo.zip");
    assert_eq!(outcome.environment.status, EnvironmentStatus::Launching);
    assert!(outcome.finished_at >= outcome.started_at);
}

#[tokio::test]
async fn test_ready_environment_is_updated() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, Some(EnvironmentStatus::Ready));

    let outcome = build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .deploy()
        .await
        .unwrap();

    let mut expected = calls_through_new_version();
    expected.push(Call::UpdateEnvironment {
        environment: "foo-env".to_string(),
        version: "2.0.0".to_string(),
    });
    assert_eq!(cloud.calls(), expected);
    assert_eq!(outcome.environment_action, EnvironmentAction::Update);
}

#[tokio::test]
async fn test_busy_environment_fails() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, Some(EnvironmentStatus::Updating));
    let (logger, lines) = capture_logger();

    let err = Deployer::with_clients(foo_config(&package), cloud.clone(), cloud.clone())
        .unwrap()
        .with_logger(logger)
        .deploy()
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        DeployError::EnvironmentNotReady { status: EnvironmentStatus::Updating, .. }
    ));
    assert!(err.to_string().contains("\"Updating\""));

    // Nothing after the environment lookup.
    assert_eq!(cloud.calls(), calls_through_new_version());

    let lines = lines.lock().unwrap();
    assert!(lines
        .iter()
        .any(|l| l.starts_with("Deployment failed:") && l.contains("Updating")));
}

#[tokio::test]
async fn test_non_ready_statuses_never_create_or_update() {
    for status in [
        EnvironmentStatus::Launching,
        EnvironmentStatus::Terminating,
        EnvironmentStatus::Aborting,
        EnvironmentStatus::Unknown("Frozen".to_string()),
    ] {
        let (_dir, package) = package_dir();
        let cloud = FakeCloud::new(BucketState::Present, true, Some(status.clone()));

        let result = build_deployer(&cloud, foo_config(&package))
            .unwrap()
            .deploy()
            .await;

        assert!(result.is_err(), "status {} must fail", status);
        assert_eq!(
            cloud.count(|c| matches!(
                c,
                Call::CreateEnvironment { .. } | Call::UpdateEnvironment { .. }
            )),
            0
        );
    }
}

#[tokio::test]
async fn test_existing_bucket_is_not_recreated() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Present, false, None);

    let outcome = build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .deploy()
        .await
        .unwrap();

    assert_eq!(outcome.bucket, BucketAction::Existing);
    assert_eq!(cloud.count(|c| matches!(c, Call::CreateBucket(_))), 0);
    assert_eq!(cloud.count(|c| matches!(c, Call::HeadBucket(_))), 1);
}

#[tokio::test]
async fn test_missing_bucket_is_created_once() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, true, Some(EnvironmentStatus::Ready));

    build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .deploy()
        .await
        .unwrap();

    assert_eq!(cloud.count(|c| matches!(c, Call::CreateBucket(_))), 1);
}

#[tokio::test]
async fn test_bucket_check_failure_aborts() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Failing(403), false, None);

    let err = build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .deploy()
        .await
        .unwrap_err();

    match &err {
        DeployError::Provider { context, source } => {
            assert!(context.contains("Check your AWS credentials and permissions"));
            assert_eq!(source.status(), Some(403));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(cloud.calls(), vec![Call::HeadBucket("foo".to_string())]);
}

#[tokio::test]
async fn test_existing_version_is_skipped() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Present, true, Some(EnvironmentStatus::Ready));

    let outcome = build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .deploy()
        .await
        .unwrap();

    assert_eq!(outcome.application_version, VersionAction::Existing);
    assert_eq!(cloud.count(|c| matches!(c, Call::CreateVersion { .. })), 0);
    assert_eq!(cloud.count(|c| matches!(c, Call::UpdateEnvironment { .. })), 1);
}

#[tokio::test]
async fn test_absent_environment_created_exactly_once() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Present, false, None);

    let config = foo_config(&package)
        .with_tier(Tier::Worker)
        .with_tag("team", "web");
    build_deployer(&cloud, config)
        .unwrap()
        .deploy()
        .await
        .unwrap();

    assert_eq!(cloud.count(|c| matches!(c, Call::UpdateEnvironment { .. })), 0);
    let creates: Vec<Call> = cloud
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::CreateEnvironment { .. }))
        .collect();
    assert_eq!(
        creates,
        vec![Call::CreateEnvironment {
            environment: "foo-env".to_string(),
            version: "2.0.0".to_string(),
            tier_type: "SQS/HTTP".to_string(),
            tags: 1,
        }]
    );
}

#[tokio::test]
async fn test_unreadable_package_fails_before_upload() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("build").join("foo.zip");
    let cloud = FakeCloud::new(BucketState::Present, false, None);

    let err = build_deployer(&cloud, foo_config(&missing))
        .unwrap()
        .deploy()
        .await
        .unwrap_err();

    match &err {
        DeployError::PackageRead { path, .. } => assert_eq!(path, &missing),
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("foo.zip"));
    assert_eq!(cloud.count(|c| matches!(c, Call::PutObject { .. })), 0);
}

#[tokio::test]
async fn test_missing_platform_fails_before_any_call() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, None);

    let config = DeploymentConfig::new("foo", &package).with_env_name("foo-env");
    let err = build_deployer(&cloud, config).err().expect("init must fail");

    assert!(matches!(err, DeployError::InvalidConfig { .. }));
    assert!(err.to_string().contains("Missing either"));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_conflicting_platform_fails_before_any_call() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, None);

    let config = foo_config(&package).with_template("saved-config");
    let err = build_deployer(&cloud, config).err().expect("init must fail");

    assert!(matches!(err, DeployError::InvalidConfig { .. }));
    assert!(err.to_string().contains("only one or the other"));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_template_platform_deploys() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Present, false, None);

    let config = DeploymentConfig::new("foo", &package)
        .with_env_name("foo-env")
        .with_template("saved-config");
    let deployer = build_deployer(&cloud, config).unwrap();

    assert_eq!(deployer.params().platform.template_name(), Some("saved-config"));
    assert_eq!(deployer.params().key(), "1.0.0-foo.zip");
    deployer.deploy().await.unwrap();
}

#[tokio::test]
async fn test_instances_are_independent() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Present, false, None);

    let first = build_deployer(&cloud, foo_config(&package)).unwrap();
    let second = build_deployer(
        &cloud,
        foo_config(&package)
            .with_bucket("Other-Bucket")
            .with_version("3.0.0"),
    )
    .unwrap();

    assert_eq!(first.params().bucket(), "foo");
    assert_eq!(second.params().bucket(), "other-bucket");

    let (a, b) = tokio::join!(first.deploy(), second.deploy());
    assert_eq!(a.unwrap().upload.key, "2.0.0-foo.zip");
    assert_eq!(b.unwrap().upload.key, "3.0.0-foo.zip");
}

#[tokio::test]
async fn test_status_is_read_only() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Present, true, Some(EnvironmentStatus::Ready));

    let status = build_deployer(&cloud, foo_config(&package))
        .unwrap()
        .status()
        .await
        .unwrap();

    assert!(status.bucket_exists);
    assert_eq!(
        status.application_version.map(|v| v.version_label),
        Some("2.0.0".to_string())
    );
    assert_eq!(
        status.environment.map(|e| e.status),
        Some(EnvironmentStatus::Ready)
    );
    assert!(cloud.calls().iter().all(|c| matches!(
        c,
        Call::HeadBucket(_) | Call::DescribeVersions(..) | Call::DescribeEnvironments(..)
    )));
}

#[tokio::test]
async fn test_status_query_needs_no_platform() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, None);
    let config = DeploymentConfig::new("Foo", &package).with_version("2.0.0");

    assert!(build_deployer(&cloud, config.clone()).is_err());

    let query = StatusQuery::with_clients(&config, cloud.clone(), cloud.clone()).unwrap();
    assert_eq!(query.keys().environment_name, "Foo-env");

    let status = query.run().await.unwrap();
    assert!(!status.bucket_exists);
    assert!(status.application_version.is_none());
    assert!(status.environment.is_none());
    assert_eq!(
        cloud.calls(),
        vec![
            Call::HeadBucket("foo".to_string()),
            Call::DescribeVersions("Foo".to_string(), "2.0.0".to_string()),
            Call::DescribeEnvironments("Foo".to_string(), "Foo-env".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_logger_receives_progress() {
    let (_dir, package) = package_dir();
    let cloud = FakeCloud::new(BucketState::Missing, false, None);
    let (logger, lines) = capture_logger();

    Deployer::with_clients(foo_config(&package), cloud.clone(), cloud.clone())
        .unwrap()
        .with_logger(logger)
        .deploy()
        .await
        .unwrap();

    let lines = lines.lock().unwrap();
    assert_eq!(lines[0], "Checking for S3 bucket \"foo\"...");
    assert!(lines.contains(&"S3 bucket \"foo\" does not exist.".to_string()));
    assert!(lines
        .iter()
        .any(|l| l == "Environment \"foo-env\" created and is now being launched."));
}
