use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, SecretKeySelector, SecretVolumeSource, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use super::{BUNDLE_LABEL, MANAGED_BY, MANAGED_BY_LABEL};
use crate::config::DownloaderConfig;
use crate::crd::package_bundle::{PackageBundle, PackageBundleSpec};

pub const DEFAULT_STORAGE_SIZE: &str = "1Gi";
pub const JOB_TTL_SECONDS: i32 = 300;
pub const JOB_BACKOFF_LIMIT: i32 = 3;
pub const PACKAGES_MOUNT: &str = "/packages";
const STORAGE_VOLUME: &str = "package-storage";
const SSH_VOLUME: &str = "git-ssh-key";
const SSH_MOUNT: &str = "/etc/git-ssh";
const SSH_KEY_MODE: i32 = 0o400;

pub fn claim_name(bundle: &PackageBundle) -> String {
    format!("{}-{}", bundle.name_any(), bundle.spec.target_name)
}

pub fn job_name(bundle: &PackageBundle) -> String {
    format!("download-{}", bundle.name_any())
}

fn labels(bundle: &PackageBundle) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
        (BUNDLE_LABEL.to_string(), bundle.name_any()),
    ])
}

fn child_meta(bundle: &PackageBundle, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: bundle.namespace(),
        labels: Some(labels(bundle)),
        owner_references: bundle.controller_owner_ref(&()).map(|r| vec![r]),
        ..Default::default()
    }
}

/// ReadWriteOnce claim the fetch Job clones into.
pub fn claim_for(bundle: &PackageBundle) -> PersistentVolumeClaim {
    let size = bundle
        .spec
        .storage_size
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STORAGE_SIZE);
    PersistentVolumeClaim {
        metadata: child_meta(bundle, claim_name(bundle)),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn clone_script(spec: &PackageBundleSpec) -> String {
    let mut git = vec!["git".to_string()];
    if spec.credentials.http_auth_secret_ref.is_some() {
        git.push(
            "-c credential.helper='!f() { echo \"username=${GIT_USERNAME}\"; \
             echo \"password=${GIT_PASSWORD}\"; }; f'"
                .to_string(),
        );
    }
    git.push("clone".to_string());
    if let Some(branch) = spec.source.branch.as_deref().filter(|b| !b.is_empty())
    {
        git.push("--branch".to_string());
        git.push(shell_quote(branch));
        git.push("--single-branch".to_string());
    }
    git.push(shell_quote(&spec.source.url));
    format!("cd {} && {}", PACKAGES_MOUNT, git.join(" "))
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// One-shot Job cloning the declared source into the bundle's claim.
pub fn job_for(bundle: &PackageBundle, cfg: &DownloaderConfig) -> Job {
    let spec = &bundle.spec;
    let mut env: Vec<EnvVar> = Vec::new();
    let mut volume_mounts = vec![VolumeMount {
        name: STORAGE_VOLUME.to_string(),
        mount_path: PACKAGES_MOUNT.to_string(),
        ..Default::default()
    }];
    let mut volumes = vec![Volume {
        name: STORAGE_VOLUME.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name(bundle),
            ..Default::default()
        }),
        ..Default::default()
    }];

    if spec.insecure_tls.unwrap_or(false) {
        env.push(EnvVar {
            name: "GIT_SSL_NO_VERIFY".to_string(),
            value: Some("true".to_string()),
            ..Default::default()
        });
    }
    if let Some(secret) = spec.credentials.ssh_key_secret_ref.as_deref() {
        env.push(EnvVar {
            name: "GIT_SSH_COMMAND".to_string(),
            value: Some(format!(
                "ssh -i {}/ssh-privatekey -o StrictHostKeyChecking=no \
                 -o UserKnownHostsFile=/dev/null",
                SSH_MOUNT
            )),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: SSH_VOLUME.to_string(),
            mount_path: SSH_MOUNT.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
        volumes.push(Volume {
            name: SSH_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.to_string()),
                default_mode: Some(SSH_KEY_MODE),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    if let Some(secret) = spec.credentials.http_auth_secret_ref.as_deref() {
        env.push(secret_env("GIT_USERNAME", secret, "username"));
        env.push(secret_env("GIT_PASSWORD", secret, "password"));
    }

    Job {
        metadata: child_meta(bundle, job_name(bundle)),
        spec: Some(JobSpec {
            ttl_seconds_after_finished: Some(JOB_TTL_SECONDS),
            backoff_limit: Some(JOB_BACKOFF_LIMIT),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(bundle)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: "downloader".to_string(),
                        image: Some(cfg.image.clone()),
                        command: Some(vec!["/bin/sh".to_string()]),
                        args: Some(vec!["-c".to_string(), clone_script(spec)]),
                        env: (!env.is_empty()).then_some(env),
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
