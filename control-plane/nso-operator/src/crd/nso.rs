use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ServicePort, Volume, VolumeMount};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A stateful NSO deployment: one headless Service plus one StatefulSet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "orchestration.cisco.com",
    version = "v1alpha1",
    kind = "NSO",
    plural = "nsos",
    shortname = "nso",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct NSOSpec {
    /// Container image running NSO
    pub image: String,
    /// Name of the headless Service fronting the StatefulSet
    pub service_name: String,
    pub replicas: i32,
    /// Labels identifying exactly the pods owned by this instance
    pub label_selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
    /// ConfigMap holding `ncs.conf`
    pub nso_config_ref: String,
    pub admin_credentials: Credentials,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Extra volumes appended after the config volume
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    /// Secret whose `password` key holds the admin password
    pub password_secret_ref: String,
}
