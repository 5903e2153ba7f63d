//! AWS implementations of [`ObjectStorage`] and [`EnvironmentManager`].
//!
//! Both clients are built from a single [`SdkConfig`] so region, credentials
//! and endpoint overrides resolve once per deployment.

use crate::config::{https_proxy_from_env, AwsConfig};
use crate::provider::{EnvironmentManager, ObjectStorage, ProviderError, ProviderResult};
use crate::types::{
    ApplicationVersion, CreateApplicationVersionRequest, CreateEnvironmentRequest,
    EnvironmentDescription, EnvironmentStatus, EnvironmentTier, OptionSetting, PutObjectRequest,
    SourceBundle, Tag, UpdateEnvironmentRequest, UploadReceipt,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_elasticbeanstalk as beanstalk;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_http_client::proxy::ProxyConfig;
use aws_smithy_http_client::tls::{self, rustls_provider::CryptoMode};
use aws_smithy_http_client::{Builder as HttpClientBuilder, Connector};
use tracing::{debug, info};

const STATIC_CREDENTIALS_PROVIDER: &str = "deployer-static";
const DEFAULT_BUCKET_REGION: &str = "us-east-1";
const MISSING_REGION: &str =
    "No AWS region configured; set one in the config file, with --region, or through AWS_REGION";

/// Resolves region, credentials and endpoint into an [`SdkConfig`].
///
/// Explicit keys take precedence over a named profile; with neither, the
/// default AWS provider chain applies. Credentials are resolved once here so
/// a missing or broken chain fails before the first API call.
///
/// HTTPS traffic goes through `config.https_proxy` when set, otherwise
/// through the standard proxy variables when `HTTPS_PROXY` is present.
pub async fn load_sdk_config(config: &AwsConfig) -> ProviderResult<SdkConfig> {
    config
        .validate()
        .map_err(|message| ProviderError::InvalidConfig { message })?;
    let proxy = resolve_proxy(config)?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(s3::config::Region::new(region.clone()));
    }

    if let Some(profile) = &config.profile {
        debug!(profile = %profile, "Using named credential profile");
        loader = loader.profile_name(profile);
    }

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        debug!("Using explicit access key credentials");
        loader = loader.credentials_provider(s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            STATIC_CREDENTIALS_PROVIDER,
        ));
    }

    if let Some(endpoint_url) = &config.endpoint_url {
        info!(endpoint = %endpoint_url, "Using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint_url);
    }

    if let Some(proxy) = proxy {
        loader = loader.http_client(proxied_http_client(proxy));
    }

    let sdk_config = loader.load().await;

    if sdk_config.region().is_none() {
        return Err(ProviderError::InvalidConfig {
            message: MISSING_REGION.to_string(),
        });
    }

    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| ProviderError::Credentials {
            message: "No AWS credentials provider could be resolved".to_string(),
        })?;
    provider
        .provide_credentials()
        .await
        .map_err(|err| ProviderError::Credentials {
            message: DisplayErrorContext(err).to_string(),
        })?;

    Ok(sdk_config)
}

fn resolve_proxy(config: &AwsConfig) -> ProviderResult<Option<ProxyConfig>> {
    if let Some(url) = &config.https_proxy {
        let proxy = ProxyConfig::https(url.as_str()).map_err(|e| ProviderError::InvalidConfig {
            message: format!("Invalid HTTPS proxy \"{}\": {}", url, e),
        })?;
        info!(proxy = %url, "Routing AWS API traffic through configured HTTPS proxy");
        return Ok(Some(proxy));
    }

    match https_proxy_from_env() {
        Ok(Some(url)) => {
            info!(proxy = %url, "Routing AWS API traffic through HTTPS_PROXY");
            Ok(Some(ProxyConfig::from_env()))
        }
        Ok(None) => Ok(None),
        Err(message) => Err(ProviderError::InvalidConfig { message }),
    }
}

/// Same rustls connector the SDK builds by default, with `proxy` in front.
fn proxied_http_client(proxy: ProxyConfig) -> s3::config::SharedHttpClient {
    HttpClientBuilder::new().build_with_connector_fn(move |settings, components| {
        let mut builder = Connector::builder().proxy_config(proxy.clone());
        builder.set_connector_settings(settings.cloned());
        if let Some(components) = components {
            builder.set_sleep_impl(components.sleep_impl());
        }
        builder
            .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
            .build()
    })
}

fn api_error<E>(operation: &'static str, err: SdkError<E>) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err
        .raw_response()
        .map(|response| response.status().as_u16());
    ProviderError::api(operation, status, DisplayErrorContext(err).to_string())
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Both AWS clients, sharing one resolved configuration.
pub struct AwsClients {
    pub storage: S3Storage,
    pub environments: BeanstalkManager,
}

impl AwsClients {
    pub async fn connect(config: &AwsConfig) -> ProviderResult<Self> {
        let sdk_config = load_sdk_config(config).await?;
        let region = sdk_config.region().map(|r| r.to_string());
        info!(region = ?region, "AWS clients configured");

        Ok(Self {
            storage: S3Storage::new(&sdk_config, config.endpoint_url.is_some()),
            environments: BeanstalkManager::new(&sdk_config),
        })
    }
}

pub struct S3Storage {
    client: s3::Client,
    region: Option<String>,
}

impl S3Storage {
    /// Path-style addressing is needed by most S3-compatible endpoints.
    pub fn new(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let config = s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            region: sdk_config.region().map(|r| r.to_string()),
        }
    }

    pub fn from_client(client: s3::Client, region: Option<String>) -> Self {
        Self { client, region }
    }

    fn location_constraint(&self) -> Option<s3::types::CreateBucketConfiguration> {
        self.region
            .as_deref()
            .filter(|region| *region != DEFAULT_BUCKET_REGION)
            .map(|region| {
                s3::types::CreateBucketConfiguration::builder()
                    .location_constraint(s3::types::BucketLocationConstraint::from(region))
                    .build()
            })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn bucket_exists(&self, bucket: &str) -> ProviderResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let status = err
                    .raw_response()
                    .map(|response| response.status().as_u16());
                let not_found = status == Some(404)
                    || err
                        .as_service_error()
                        .map(|service| service.is_not_found())
                        .unwrap_or(false);

                if not_found {
                    Ok(false)
                } else {
                    Err(api_error("HeadBucket", err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> ProviderResult<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.location_constraint())
            .send()
            .await
            .map_err(|err| api_error("CreateBucket", err))?;
        Ok(())
    }

    async fn put_object(&self, request: PutObjectRequest) -> ProviderResult<UploadReceipt> {
        let size = request.body.len();
        let output = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_type(&request.content_type)
            .body(ByteStream::from(request.body))
            .send()
            .await
            .map_err(|err| api_error("PutObject", err))?;

        Ok(UploadReceipt {
            bucket: request.bucket,
            key: request.key,
            size,
            e_tag: output.e_tag().map(str::to_string),
        })
    }

    fn provider_name(&self) -> &'static str {
        "s3"
    }
}

pub struct BeanstalkManager {
    client: beanstalk::Client,
}

impl BeanstalkManager {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: beanstalk::Client::new(sdk_config),
        }
    }

    pub fn from_client(client: beanstalk::Client) -> Self {
        Self { client }
    }
}

fn status_from_sdk(status: Option<&beanstalk::types::EnvironmentStatus>) -> EnvironmentStatus {
    status
        .map(|s| EnvironmentStatus::from(s.as_str()))
        .unwrap_or_else(|| EnvironmentStatus::Unknown("Unknown".to_string()))
}

fn environment_from_sdk(desc: &beanstalk::types::EnvironmentDescription) -> EnvironmentDescription {
    EnvironmentDescription {
        environment_id: desc.environment_id().map(str::to_string),
        environment_name: desc.environment_name().unwrap_or_default().to_string(),
        application_name: desc.application_name().map(str::to_string),
        status: status_from_sdk(desc.status()),
        version_label: desc.version_label().map(str::to_string),
        cname: desc.cname().map(str::to_string),
        health: desc.health().map(|h| h.as_str().to_string()),
    }
}

fn created_environment(
    output: &beanstalk::operation::create_environment::CreateEnvironmentOutput,
) -> EnvironmentDescription {
    EnvironmentDescription {
        environment_id: output.environment_id().map(str::to_string),
        environment_name: output.environment_name().unwrap_or_default().to_string(),
        application_name: output.application_name().map(str::to_string),
        status: status_from_sdk(output.status()),
        version_label: output.version_label().map(str::to_string),
        cname: output.cname().map(str::to_string),
        health: output.health().map(|h| h.as_str().to_string()),
    }
}

fn updated_environment(
    output: &beanstalk::operation::update_environment::UpdateEnvironmentOutput,
) -> EnvironmentDescription {
    EnvironmentDescription {
        environment_id: output.environment_id().map(str::to_string),
        environment_name: output.environment_name().unwrap_or_default().to_string(),
        application_name: output.application_name().map(str::to_string),
        status: status_from_sdk(output.status()),
        version_label: output.version_label().map(str::to_string),
        cname: output.cname().map(str::to_string),
        health: output.health().map(|h| h.as_str().to_string()),
    }
}

fn version_from_sdk(desc: &beanstalk::types::ApplicationVersionDescription) -> ApplicationVersion {
    ApplicationVersion {
        application_name: desc.application_name().unwrap_or_default().to_string(),
        version_label: desc.version_label().unwrap_or_default().to_string(),
        source_bundle: desc.source_bundle().map(|bundle| SourceBundle {
            s3_bucket: bundle.s3_bucket().unwrap_or_default().to_string(),
            s3_key: bundle.s3_key().unwrap_or_default().to_string(),
        }),
        status: desc.status().map(|s| s.as_str().to_string()),
    }
}

fn tier_to_sdk(tier: &EnvironmentTier) -> beanstalk::types::EnvironmentTier {
    beanstalk::types::EnvironmentTier::builder()
        .name(&tier.name)
        .r#type(&tier.tier_type)
        .version(&tier.version)
        .build()
}

fn tag_to_sdk(tag: &Tag) -> beanstalk::types::Tag {
    beanstalk::types::Tag::builder()
        .key(&tag.key)
        .value(&tag.value)
        .build()
}

fn option_setting_to_sdk(setting: &OptionSetting) -> beanstalk::types::ConfigurationOptionSetting {
    beanstalk::types::ConfigurationOptionSetting::builder()
        .namespace(&setting.namespace)
        .option_name(&setting.option_name)
        .value(&setting.value)
        .set_resource_name(setting.resource_name.clone())
        .build()
}

#[async_trait]
impl EnvironmentManager for BeanstalkManager {
    async fn describe_environments(
        &self,
        application_name: &str,
        environment_name: &str,
    ) -> ProviderResult<Vec<EnvironmentDescription>> {
        let output = self
            .client
            .describe_environments()
            .application_name(application_name)
            .environment_names(environment_name)
            .include_deleted(false)
            .send()
            .await
            .map_err(|err| api_error("DescribeEnvironments", err))?;

        Ok(output
            .environments()
            .iter()
            .map(environment_from_sdk)
            .collect())
    }

    async fn create_environment(
        &self,
        request: CreateEnvironmentRequest,
    ) -> ProviderResult<EnvironmentDescription> {
        let output = self
            .client
            .create_environment()
            .application_name(request.application_name)
            .environment_name(request.environment_name)
            .set_description(request.description)
            .set_solution_stack_name(request.platform.solution_stack_name().map(str::to_string))
            .set_template_name(request.platform.template_name().map(str::to_string))
            .version_label(request.version_label)
            .tier(tier_to_sdk(&request.tier))
            .set_tags(non_empty(request.tags.iter().map(tag_to_sdk).collect()))
            .set_option_settings(non_empty(
                request
                    .option_settings
                    .iter()
                    .map(option_setting_to_sdk)
                    .collect(),
            ))
            .send()
            .await
            .map_err(|err| api_error("CreateEnvironment", err))?;

        Ok(created_environment(&output))
    }

    async fn update_environment(
        &self,
        request: UpdateEnvironmentRequest,
    ) -> ProviderResult<EnvironmentDescription> {
        let output = self
            .client
            .update_environment()
            .environment_name(request.environment_name)
            .set_description(request.description)
            .set_solution_stack_name(request.platform.solution_stack_name().map(str::to_string))
            .set_template_name(request.platform.template_name().map(str::to_string))
            .version_label(request.version_label)
            .set_option_settings(non_empty(
                request
                    .option_settings
                    .iter()
                    .map(option_setting_to_sdk)
                    .collect(),
            ))
            .send()
            .await
            .map_err(|err| api_error("UpdateEnvironment", err))?;

        Ok(updated_environment(&output))
    }

    async fn describe_application_versions(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> ProviderResult<Vec<ApplicationVersion>> {
        let output = self
            .client
            .describe_application_versions()
            .application_name(application_name)
            .version_labels(version_label)
            .send()
            .await
            .map_err(|err| api_error("DescribeApplicationVersions", err))?;

        Ok(output
            .application_versions()
            .iter()
            .map(version_from_sdk)
            .collect())
    }

    async fn create_application_version(
        &self,
        request: CreateApplicationVersionRequest,
    ) -> ProviderResult<ApplicationVersion> {
        let source_bundle = beanstalk::types::S3Location::builder()
            .s3_bucket(&request.source_bundle.s3_bucket)
            .s3_key(&request.source_bundle.s3_key)
            .build();

        let output = self
            .client
            .create_application_version()
            .application_name(&request.application_name)
            .version_label(&request.version_label)
            .set_description(request.description.clone())
            .auto_create_application(request.auto_create_application)
            .source_bundle(source_bundle)
            .send()
            .await
            .map_err(|err| api_error("CreateApplicationVersion", err))?;

        Ok(output
            .application_version()
            .map(version_from_sdk)
            .unwrap_or(ApplicationVersion {
                application_name: request.application_name,
                version_label: request.version_label,
                source_bundle: Some(request.source_bundle),
                status: None,
            }))
    }

    fn provider_name(&self) -> &'static str {
        "elasticbeanstalk"
    }
}
