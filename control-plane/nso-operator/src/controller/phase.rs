//! PackageBundle phase tracking.
//!
//! The phase is derived on every poll from the fetch Job's status snapshot
//! and written back only when the stored phase differs, so repeated polls
//! leave `lastTransitionTime` alone.

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tracing::{debug, error, info, instrument};

use super::ReconcileErr;
use crate::crd::package_bundle::{PackageBundle, PackageBundlePhase};
use crate::store::{ObjectStore, is_conflict};

pub const MSG_JOB_NOT_FOUND: &str = "Job not found";
pub const MSG_COMPLETED: &str = "Package download completed successfully";
pub const MSG_FAILED: &str = "Package download failed";
pub const MSG_RUNNING: &str = "Package download in progress";
pub const MSG_CREATING: &str = "Job is creating containers";
pub const MSG_UNKNOWN: &str = "Job status unknown";

/// Pause between status writes that lost a resourceVersion race.
pub const CONFLICT_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobPhase {
    pub phase: PackageBundlePhase,
    pub message: String,
}

impl JobPhase {
    fn new(phase: PackageBundlePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

fn has_true_condition<'a>(job: &'a Job, type_: &str) -> Option<&'a str> {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| {
            conds.iter().find(|c| c.type_ == type_ && c.status == "True")
        })
        .map(|c| c.message.as_deref().unwrap_or(""))
}

/// Map a Job status snapshot onto a bundle phase. `None` means the Job does
/// not exist (yet).
pub fn phase_from_job(job: Option<&Job>) -> JobPhase {
    use PackageBundlePhase::*;

    let Some(job) = job else {
        return JobPhase::new(Pending, MSG_JOB_NOT_FOUND);
    };

    // Completion wins over failure when both are reported.
    if has_true_condition(job, "Complete").is_some() {
        return JobPhase::new(Downloaded, MSG_COMPLETED);
    }
    if let Some(msg) = has_true_condition(job, "Failed") {
        let msg = if msg.is_empty() { MSG_FAILED } else { msg };
        return JobPhase::new(FailedToDownload, msg);
    }

    let status = job.status.clone().unwrap_or_default();
    let active = status.active.unwrap_or(0);
    let succeeded = status.succeeded.unwrap_or(0);
    let failed = status.failed.unwrap_or(0);

    if active > 0 {
        return JobPhase::new(Downloading, MSG_RUNNING);
    }
    if succeeded == 0 && failed == 0 {
        return JobPhase::new(ContainerCreating, MSG_CREATING);
    }
    JobPhase::new(Pending, MSG_UNKNOWN)
}

/// Persist `phase` on the bundle `ns/name`.
///
/// Always works on a freshly fetched copy so unrelated concurrent changes
/// survive. Returns whether a write happened. Conflicts are retried up to
/// `attempts` times, [`CONFLICT_RETRY_DELAY`] apart; any other error is
/// returned immediately.
#[instrument(skip(store, message, phase), fields(%phase))]
pub async fn persist_phase<S: ObjectStore>(
    store: &S,
    ns: &str,
    name: &str,
    phase: PackageBundlePhase,
    message: &str,
    job_name: &str,
    attempts: u32,
) -> Result<bool, ReconcileErr> {
    for attempt in 1..=attempts {
        let Some(mut latest) =
            store.get_opt::<PackageBundle>(ns, name).await?
        else {
            debug!("bundle gone; nothing to update");
            return Ok(false);
        };

        if latest.phase() == Some(phase) {
            debug!("phase unchanged; skipping status write");
            return Ok(false);
        }

        let mut status = latest.status.take().unwrap_or_default();
        status.phase = Some(phase);
        status.message = Some(message.to_string());
        status.job_name = Some(job_name.to_string());
        status.last_transition_time = Some(Time(Utc::now()));
        latest.status = Some(status);

        match store.replace_status(ns, &latest).await {
            Ok(_) => {
                info!(%message, "updated PackageBundle phase");
                return Ok(true);
            }
            Err(e) if is_conflict(&e) => {
                debug!(attempt, "status write conflicted; retrying");
                if attempt < attempts {
                    tokio::time::sleep(CONFLICT_RETRY_DELAY).await;
                }
            }
            Err(e) => {
                error!(error = %e, %message, "failed to update PackageBundle status");
                return Err(e.into());
            }
        }
    }

    Err(ReconcileErr::StatusConflict {
        name: format!("{ns}/{name}"),
        attempts,
    })
}
