//! Provider payloads derived once from a [`DeploymentConfig`].

use crate::config::DeploymentConfig;
use crate::error::{DeployError, DeployResult};
use cloud::{
    CreateApplicationVersionRequest, CreateEnvironmentRequest, EnvironmentTier, OptionSetting,
    Platform, SourceBundle, Tag, UpdateEnvironmentRequest,
};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

const TIER_VERSION: &str = "1.0";
const BUCKET_NAME_PATTERN: &str = r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$";

fn bucket_name_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(BUCKET_NAME_PATTERN).expect("bucket pattern compiles"))
}

/// Names that identify existing resources. Deriving them does not need a
/// platform, so read-only queries work on partial configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupKeys {
    pub application_name: String,
    pub environment_name: String,
    pub version_label: String,
    pub bucket: String,
}

impl LookupKeys {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        config.validate().map_err(DeployError::invalid_config)?;
        Self::derive(config)
    }

    fn derive(config: &DeploymentConfig) -> DeployResult<Self> {
        let bucket = bucket_name(config);
        validate_bucket_name(&bucket)?;

        Ok(Self {
            application_name: config.app_name.clone(),
            environment_name: config.environment_name(),
            version_label: config.version_label().to_string(),
            bucket,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentParameters {
    pub application_name: String,
    pub environment_name: String,
    pub description: Option<String>,
    pub version_label: String,
    pub source_bundle: SourceBundle,
    pub auto_create_application: bool,
    pub platform: Platform,
    pub tier: EnvironmentTier,
    pub tags: Vec<Tag>,
    pub option_settings: Vec<OptionSetting>,
}

impl DeploymentParameters {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        config.validate().map_err(DeployError::invalid_config)?;

        let platform =
            resolve_platform(config.solution_stack.as_deref(), config.template.as_deref())?;
        let keys = LookupKeys::derive(config)?;
        let s3_key = object_key(&keys.version_label, &config.code_package)?;

        Ok(Self {
            application_name: keys.application_name,
            environment_name: keys.environment_name,
            description: config.description.clone(),
            version_label: keys.version_label,
            source_bundle: SourceBundle {
                s3_bucket: keys.bucket,
                s3_key,
            },
            auto_create_application: true,
            platform,
            tier: EnvironmentTier {
                name: config.tier.name().to_string(),
                tier_type: config.tier.tier_type().to_string(),
                version: TIER_VERSION.to_string(),
            },
            tags: config.environment_tags.clone(),
            option_settings: config.environment_settings.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.source_bundle.s3_bucket
    }

    pub fn key(&self) -> &str {
        &self.source_bundle.s3_key
    }

    pub fn lookup_keys(&self) -> LookupKeys {
        LookupKeys {
            application_name: self.application_name.clone(),
            environment_name: self.environment_name.clone(),
            version_label: self.version_label.clone(),
            bucket: self.bucket().to_string(),
        }
    }

    pub fn create_application_version_request(&self) -> CreateApplicationVersionRequest {
        CreateApplicationVersionRequest {
            application_name: self.application_name.clone(),
            version_label: self.version_label.clone(),
            description: self.description.clone(),
            source_bundle: self.source_bundle.clone(),
            auto_create_application: self.auto_create_application,
        }
    }

    pub fn create_environment_request(&self) -> CreateEnvironmentRequest {
        CreateEnvironmentRequest {
            application_name: self.application_name.clone(),
            environment_name: self.environment_name.clone(),
            description: self.description.clone(),
            platform: self.platform.clone(),
            version_label: self.version_label.clone(),
            tier: self.tier.clone(),
            tags: self.tags.clone(),
            option_settings: self.option_settings.clone(),
        }
    }

    pub fn update_environment_request(&self) -> UpdateEnvironmentRequest {
        UpdateEnvironmentRequest {
            environment_name: self.environment_name.clone(),
            description: self.description.clone(),
            platform: self.platform.clone(),
            version_label: self.version_label.clone(),
            option_settings: self.option_settings.clone(),
        }
    }
}

/// Exactly one of the two must be set; blank strings count as unset.
pub fn resolve_platform(
    solution_stack: Option<&str>,
    template: Option<&str>,
) -> DeployResult<Platform> {
    let solution_stack = solution_stack.map(str::trim).filter(|s| !s.is_empty());
    let template = template.map(str::trim).filter(|s| !s.is_empty());

    match (solution_stack, template) {
        (Some(stack), None) => Ok(Platform::SolutionStack(stack.to_string())),
        (None, Some(template)) => Ok(Platform::Template(template.to_string())),
        (None, None) => Err(DeployError::invalid_config(
            "Missing either \"solutionStack\" or \"template\" config",
        )),
        (Some(_), Some(_)) => Err(DeployError::invalid_config(
            "Provided both \"solutionStack\" and \"template\" config; only one or the other supported",
        )),
    }
}

/// The bucket override, or the application name, lower-cased.
pub fn bucket_name(config: &DeploymentConfig) -> String {
    config
        .s3_bucket
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(config.app_name.as_str())
        .to_lowercase()
}

pub fn validate_bucket_name(bucket: &str) -> DeployResult<()> {
    if !bucket_name_regex().is_match(bucket) || bucket.contains("..") {
        return Err(DeployError::invalid_config(format!(
            "\"{}\" is not a valid S3 bucket name; set s3_bucket to 3-63 lowercase letters, digits, dots or hyphens",
            bucket
        )));
    }
    Ok(())
}

/// `<version>-<package file name>`
pub fn object_key(version_label: &str, code_package: &Path) -> DeployResult<String> {
    let file_name = code_package
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            DeployError::invalid_config(format!(
                "code_package \"{}\" does not name a file",
                code_package.display()
            ))
        })?;

    Ok(format!("{}-{}", version_label, file_name))
}
