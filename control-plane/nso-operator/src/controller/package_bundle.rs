use std::sync::Arc;

use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, instrument};

use super::phase::{persist_phase, phase_from_job};
use super::{Context, Outcome, ReconcileErr};
use crate::builders::{ChildResource, claim_for, job_for, job_name};
use crate::controller::ensure::ensure_child;
use crate::crd::package_bundle::{PackageBundle, PackageBundlePhase};
use crate::store::ObjectStore;

pub const MSG_CREATED: &str = "PackageBundle created";
pub const MSG_JOB_CREATED: &str = "Job created, waiting for containers";

#[instrument(skip_all, fields(ns = %obj.namespace().unwrap_or_else(|| "default".into()), name = %obj.name_any()))]
pub async fn reconcile<S: ObjectStore>(
    obj: Arc<PackageBundle>,
    ctx: Arc<Context<S>>,
) -> Result<Action, ReconcileErr> {
    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    reconcile_bundle(&ctx, &ns, &obj.name_any())
        .await
        .map(Action::from)
}

/// Record a failed child creation on the bundle, then hand back the
/// original error. A failing status write is only logged.
async fn mark_failed<S: ObjectStore>(
    ctx: &Context<S>,
    ns: &str,
    name: &str,
    message: String,
    job: &str,
    cause: kube::Error,
) -> ReconcileErr {
    let attempts = ctx.cfg.reconcile.status_attempts();
    if let Err(e) = persist_phase(
        &ctx.store,
        ns,
        name,
        PackageBundlePhase::FailedToDownload,
        &message,
        job,
        attempts,
    )
    .await
    {
        error!(error = %e, "failed to record download failure");
    }
    cause.into()
}

/// One pass over a PackageBundle.
///
/// Creates the claim, then the fetch Job, one per pass, and afterwards polls
/// the Job while it is scheduled or running. `Downloaded` bundles are left
/// alone.
pub async fn reconcile_bundle<S: ObjectStore>(
    ctx: &Context<S>,
    ns: &str,
    name: &str,
) -> Result<Outcome, ReconcileErr> {
    use PackageBundlePhase::*;

    let attempts = ctx.cfg.reconcile.status_attempts();
    let Some(bundle) = ctx.store.get_opt::<PackageBundle>(ns, name).await?
    else {
        debug!("PackageBundle not found; assuming it was deleted");
        return Ok(Outcome::Done);
    };

    match bundle.phase() {
        None => {
            persist_phase(&ctx.store, ns, name, Pending, MSG_CREATED, "", attempts)
                .await?;
        }
        Some(Downloaded) => {
            debug!("download already completed");
            return Ok(Outcome::Done);
        }
        Some(_) => {}
    }

    let claim = ChildResource::Claim(claim_for(&bundle));
    match ensure_child(&ctx.store, &claim).await {
        Ok(true) => {
            info!(claim = %claim.name(), "created storage claim");
            return Ok(Outcome::RequeueNow);
        }
        Ok(false) => {}
        Err(e) => {
            let msg = format!("Failed to create PVC: {e}");
            return Err(mark_failed(ctx, ns, name, msg, "", e).await);
        }
    }

    let job_name = job_name(&bundle);
    let job = ChildResource::Job(job_for(&bundle, &ctx.cfg.downloader));
    match ensure_child(&ctx.store, &job).await {
        Ok(true) => {
            info!(job = %job_name, "created fetch Job");
            persist_phase(
                &ctx.store,
                ns,
                name,
                ContainerCreating,
                MSG_JOB_CREATED,
                &job_name,
                attempts,
            )
            .await?;
            return Ok(Outcome::RequeueNow);
        }
        Ok(false) => {}
        Err(e) => {
            let msg = format!("Failed to create Job: {e}");
            return Err(mark_failed(ctx, ns, name, msg, &job_name, e).await);
        }
    }

    let current = ctx.store.get_opt::<Job>(ns, &job_name).await?;
    let derived = phase_from_job(current.as_ref());
    persist_phase(
        &ctx.store,
        ns,
        name,
        derived.phase,
        &derived.message,
        &job_name,
        attempts,
    )
    .await?;

    match derived.phase {
        ContainerCreating | Downloading => {
            debug!(phase = %derived.phase, "download in flight; polling later");
            Ok(Outcome::RequeueAfter(ctx.cfg.reconcile.poll_interval()))
        }
        Downloaded | FailedToDownload => {
            info!(phase = %derived.phase, "download finished");
            Ok(Outcome::Done)
        }
        // Job missing or in an unrecognised shape; the owned Job watch
        // triggers the next pass.
        Pending => {
            debug!(message = %derived.message, "job state unclear; awaiting change");
            Ok(Outcome::Done)
        }
    }
}
