//! Desired state of every child object, computed from the parent spec alone.
//!
//! Nothing in here performs I/O. Given the same parent the builders always
//! return the same objects, including names, so re-running a reconcile can
//! never produce a second copy of a child.

mod nso;
mod package_bundle;

pub use nso::{
    CONFIG_FILE, CONFIG_MOUNT_PATH, CONFIG_VOLUME, HTTP_PORT, HTTPS_PORT,
    service_for, statefulset_for,
};
pub use package_bundle::{
    JOB_BACKOFF_LIMIT, JOB_TTL_SECONDS, PACKAGES_MOUNT, claim_for,
    claim_name, job_for, job_name,
};

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use kube::ResourceExt;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "nso-operator";
pub const BUNDLE_LABEL: &str = "orchestration.cisco.com/package-bundle";

/// A child object ready to be handed to the existence check.
#[derive(Clone, Debug)]
pub enum ChildResource {
    Service(Service),
    StatefulSet(StatefulSet),
    Claim(PersistentVolumeClaim),
    Job(Job),
}

impl ChildResource {
    pub fn kind(&self) -> &'static str {
        match self {
            ChildResource::Service(_) => "Service",
            ChildResource::StatefulSet(_) => "StatefulSet",
            ChildResource::Claim(_) => "PersistentVolumeClaim",
            ChildResource::Job(_) => "Job",
        }
    }

    pub fn name(&self) -> String {
        match self {
            ChildResource::Service(o) => o.name_any(),
            ChildResource::StatefulSet(o) => o.name_any(),
            ChildResource::Claim(o) => o.name_any(),
            ChildResource::Job(o) => o.name_any(),
        }
    }
}
