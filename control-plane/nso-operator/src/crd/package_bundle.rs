use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// External package content fetched into a claim an NSO can mount.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "orchestration.cisco.com",
    version = "v1alpha1",
    kind = "PackageBundle",
    plural = "packagebundles",
    namespaced,
    status = "PackageBundleStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.targetName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PackageBundleSpec {
    /// NSO instance the bundle is meant for; only used for naming
    pub target_name: String,
    /// Requested claim size, e.g. "5Gi". Defaults to 1Gi.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,
    pub origin: OriginType,
    #[serde(
        default,
        rename = "insecureTLS",
        skip_serializing_if = "Option::is_none"
    )]
    pub insecure_tls: Option<bool>,
    #[serde(default)]
    pub credentials: AccessCredentials,
    pub source: PackageSource,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum OriginType {
    #[serde(rename = "SCM")]
    Scm,
    #[serde(rename = "URL")]
    Url,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccessCredentials {
    /// Secret with an `ssh-privatekey` entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_secret_ref: Option<String>,
    /// Secret with `username` and `password` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_auth_secret_ref: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct PackageSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageBundleStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PackageBundlePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum PackageBundlePhase {
    Pending,
    ContainerCreating,
    Downloading,
    Downloaded,
    FailedToDownload,
}

impl PackageBundlePhase {
    /// No further polling happens once a terminal phase is reached.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Downloaded | Self::FailedToDownload)
    }
}

impl std::fmt::Display for PackageBundlePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::ContainerCreating => "ContainerCreating",
            Self::Downloading => "Downloading",
            Self::Downloaded => "Downloaded",
            Self::FailedToDownload => "FailedToDownload",
        };
        f.write_str(s)
    }
}

impl PackageBundle {
    pub fn phase(&self) -> Option<PackageBundlePhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }
}
