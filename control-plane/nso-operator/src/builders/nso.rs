use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
    KeyToPath, PodSpec, PodTemplateSpec, SecretKeySelector, Service,
    ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta,
};
use kube::{Resource, ResourceExt};

use crate::crd::nso::NSO;

pub const HTTP_PORT: i32 = 8080;
pub const HTTPS_PORT: i32 = 8888;
pub const CONFIG_VOLUME: &str = "ncs-config";
pub const CONFIG_FILE: &str = "ncs.conf";
pub const CONFIG_MOUNT_PATH: &str = "/etc/ncs/ncs.conf";
const CONFIG_FILE_MODE: i32 = 0o600;
const CONTAINER_NAME: &str = "ncs";
const PASSWORD_KEY: &str = "password";

/// Headless Service named after `spec.serviceName`.
pub fn service_for(nso: &NSO) -> Service {
    let labels = nso.spec.label_selector.clone();
    Service {
        metadata: ObjectMeta {
            name: Some(nso.spec.service_name.clone()),
            namespace: nso.namespace(),
            labels: Some(labels.clone()),
            owner_references: nso.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            cluster_ip: Some("None".to_string()),
            selector: Some(labels),
            ports: Some(nso.spec.ports.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// StatefulSet named after the NSO itself, governed by the headless Service.
pub fn statefulset_for(nso: &NSO) -> StatefulSet {
    let labels = nso.spec.label_selector.clone();

    // Admin credentials always come first; user entries are appended as-is,
    // duplicates included.
    let mut env = vec![
        EnvVar {
            name: "ADMIN_USERNAME".to_string(),
            value: Some(nso.spec.admin_credentials.username.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "ADMIN_PASSWORD".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: nso.spec.admin_credentials.password_secret_ref.clone(),
                    key: PASSWORD_KEY.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];
    env.extend(nso.spec.env.iter().cloned());

    let mut volume_mounts = vec![VolumeMount {
        name: CONFIG_VOLUME.to_string(),
        mount_path: CONFIG_MOUNT_PATH.to_string(),
        sub_path: Some(CONFIG_FILE.to_string()),
        read_only: Some(true),
        ..Default::default()
    }];
    volume_mounts.extend(nso.spec.volume_mounts.iter().cloned());

    let mut volumes = vec![Volume {
        name: CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: nso.spec.nso_config_ref.clone(),
            items: Some(vec![KeyToPath {
                key: CONFIG_FILE.to_string(),
                path: CONFIG_FILE.to_string(),
                mode: Some(CONFIG_FILE_MODE),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }];
    volumes.extend(nso.spec.volumes.iter().cloned());

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(nso.name_any()),
            namespace: nso.namespace(),
            owner_references: nso.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            service_name: Some(nso.spec.service_name.clone()),
            replicas: Some(nso.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(nso.spec.image.clone()),
                        ports: Some(vec![
                            ContainerPort {
                                name: Some("http".to_string()),
                                container_port: HTTP_PORT,
                                ..Default::default()
                            },
                            ContainerPort {
                                name: Some("https".to_string()),
                                container_port: HTTPS_PORT,
                                ..Default::default()
                            },
                        ]),
                        env: Some(env),
                        volume_mounts: Some(volume_mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
