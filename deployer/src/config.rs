use crate::error::{DeployError, DeployResult};
use cloud::{AwsConfig, OptionSetting, Tag};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_VERSION: &str = "1.0.0";

/// Environment tier; workers consume an SQS queue instead of serving HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tier {
    #[default]
    WebServer,
    Worker,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Tier::WebServer => "WebServer",
            Tier::Worker => "Worker",
        }
    }

    pub fn tier_type(&self) -> &'static str {
        match self {
            Tier::WebServer => "Standard",
            Tier::Worker => "SQS/HTTP",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webserver" | "web-server" | "web" => Ok(Tier::WebServer),
            "worker" => Ok(Tier::Worker),
            other => Err(format!(
                "unknown tier \"{}\" (expected WebServer or Worker)",
                other
            )),
        }
    }
}

/// Everything needed to publish one application version.
///
/// Loaded from TOML or JSON. camelCase JSON keys (`appName`, `codePackage`,
/// `S3Bucket`, ...) are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(alias = "appName")]
    pub app_name: String,

    #[serde(default, alias = "envName")]
    pub env_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(alias = "codePackage")]
    pub code_package: PathBuf,

    #[serde(default, alias = "S3Bucket", alias = "s3Bucket")]
    pub s3_bucket: Option<String>,

    #[serde(default, alias = "solutionStack")]
    pub solution_stack: Option<String>,

    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub tier: Tier,

    #[serde(default, alias = "environmentTags")]
    pub environment_tags: Vec<Tag>,

    #[serde(default, alias = "environmentSettings")]
    pub environment_settings: Vec<OptionSetting>,

    #[serde(flatten)]
    pub aws: AwsConfig,
}

impl DeploymentConfig {
    pub fn new(app_name: impl Into<String>, code_package: impl Into<PathBuf>) -> Self {
        Self {
            app_name: app_name.into(),
            env_name: None,
            description: None,
            version: None,
            code_package: code_package.into(),
            s3_bucket: None,
            solution_stack: None,
            template: None,
            tier: Tier::default(),
            environment_tags: Vec::new(),
            environment_settings: Vec::new(),
            aws: AwsConfig::default(),
        }
    }

    /// Reads a config file; `.json` is parsed as JSON, anything else as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> DeployResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| DeployError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(&contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| DeployError::ConfigFile {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn with_env_name(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = Some(env_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.s3_bucket = Some(bucket.into());
        self
    }

    pub fn with_solution_stack(mut self, solution_stack: impl Into<String>) -> Self {
        self.solution_stack = Some(solution_stack.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_tags.push(Tag::new(key, value));
        self
    }

    pub fn with_setting(mut self, setting: OptionSetting) -> Self {
        self.environment_settings.push(setting);
        self
    }

    pub fn with_aws(mut self, aws: AwsConfig) -> Self {
        self.aws = aws;
        self
    }

    pub fn version_label(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_VERSION)
    }

    /// Falls back to `<app_name>-env`.
    pub fn environment_name(&self) -> String {
        self.env_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{}-env", self.app_name))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.app_name.trim().is_empty() {
            return Err("app_name is required".to_string());
        }

        if self.code_package.as_os_str().is_empty() {
            return Err("code_package is required".to_string());
        }

        for tag in &self.environment_tags {
            if tag.key.trim().is_empty() {
                return Err("environment tag keys cannot be empty".to_string());
            }
        }

        for setting in &self.environment_settings {
            if setting.namespace.trim().is_empty() || setting.option_name.trim().is_empty() {
                return Err(
                    "environment settings need both a namespace and an option_name".to_string(),
                );
            }
        }

        self.aws.validate()
    }
}
