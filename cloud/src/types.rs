use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status reported for an Elastic Beanstalk environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvironmentStatus {
    Aborting,
    Launching,
    LinkingFrom,
    LinkingTo,
    Ready,
    Terminated,
    Terminating,
    Updating,
    Unknown(String),
}

impl EnvironmentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EnvironmentStatus::Aborting => "Aborting",
            EnvironmentStatus::Launching => "Launching",
            EnvironmentStatus::LinkingFrom => "LinkingFrom",
            EnvironmentStatus::LinkingTo => "LinkingTo",
            EnvironmentStatus::Ready => "Ready",
            EnvironmentStatus::Terminated => "Terminated",
            EnvironmentStatus::Terminating => "Terminating",
            EnvironmentStatus::Updating => "Updating",
            EnvironmentStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EnvironmentStatus::Ready)
    }
}

impl From<&str> for EnvironmentStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "Aborting" => EnvironmentStatus::Aborting,
            "Launching" => EnvironmentStatus::Launching,
            "LinkingFrom" => EnvironmentStatus::LinkingFrom,
            "LinkingTo" => EnvironmentStatus::LinkingTo,
            "Ready" => EnvironmentStatus::Ready,
            "Terminated" => EnvironmentStatus::Terminated,
            "Terminating" => EnvironmentStatus::Terminating,
            "Updating" => EnvironmentStatus::Updating,
            other => EnvironmentStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for EnvironmentStatus {
    fn from(raw: String) -> Self {
        EnvironmentStatus::from(raw.as_str())
    }
}

impl From<EnvironmentStatus> for String {
    fn from(status: EnvironmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescription {
    pub environment_id: Option<String>,
    pub environment_name: String,
    pub application_name: Option<String>,
    pub status: EnvironmentStatus,
    pub version_label: Option<String>,
    pub cname: Option<String>,
    pub health: Option<String>,
}

impl EnvironmentDescription {
    pub fn new(environment_name: impl Into<String>, status: EnvironmentStatus) -> Self {
        Self {
            environment_id: None,
            environment_name: environment_name.into(),
            application_name: None,
            status,
            version_label: None,
            cname: None,
            health: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationVersion {
    pub application_name: String,
    pub version_label: String,
    pub source_bundle: Option<SourceBundle>,
    pub status: Option<String>,
}

/// Location of an uploaded code package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBundle {
    pub s3_bucket: String,
    pub s3_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentTier {
    pub name: String,
    #[serde(rename = "type")]
    pub tier_type: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetting {
    #[serde(alias = "Namespace")]
    pub namespace: String,
    #[serde(alias = "OptionName")]
    pub option_name: String,
    #[serde(alias = "Value")]
    pub value: String,
    #[serde(default, alias = "ResourceName")]
    pub resource_name: Option<String>,
}

impl OptionSetting {
    pub fn new(
        namespace: impl Into<String>,
        option_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            option_name: option_name.into(),
            value: value.into(),
            resource_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(alias = "Key")]
    pub key: String,
    #[serde(alias = "Value")]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Exactly one of a solution stack or a saved configuration template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    SolutionStack(String),
    Template(String),
}

impl Platform {
    pub fn solution_stack_name(&self) -> Option<&str> {
        match self {
            Platform::SolutionStack(name) => Some(name),
            Platform::Template(_) => None,
        }
    }

    pub fn template_name(&self) -> Option<&str> {
        match self {
            Platform::Template(name) => Some(name),
            Platform::SolutionStack(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

impl PutObjectRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_type: "binary/octet-stream".to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub size: usize,
    pub e_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationVersionRequest {
    pub application_name: String,
    pub version_label: String,
    pub description: Option<String>,
    pub source_bundle: SourceBundle,
    pub auto_create_application: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnvironmentRequest {
    pub application_name: String,
    pub environment_name: String,
    pub description: Option<String>,
    pub platform: Platform,
    pub version_label: String,
    pub tier: EnvironmentTier,
    pub tags: Vec<Tag>,
    pub option_settings: Vec<OptionSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnvironmentRequest {
    pub environment_name: String,
    pub description: Option<String>,
    pub platform: Platform,
    pub version_label: String,
    pub option_settings: Vec<OptionSetting>,
}
