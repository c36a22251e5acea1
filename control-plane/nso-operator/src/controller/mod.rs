pub mod ensure;
pub mod nso;
pub mod package_bundle;
pub mod phase;
pub mod watch_mapper;


use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Secret, Service,
};
use kube::{
    Client, Resource, ResourceExt,
    api::Api,
    runtime::{
        Controller,
        controller::Action,
        reflector::{ObjectRef, Store},
        watcher::Config,
    },
};
use tracing::{error, info, warn};

use crate::config::OperatorConfig;
use crate::crd::{nso::NSO, package_bundle::PackageBundle};
use crate::store::{KubeStore, ObjectStore};
use watch_mapper::{SecondaryKind, instances_for_change};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
    #[error("status of {name} still conflicting after {attempts} attempts")]
    StatusConflict { name: String, attempts: u32 },
}

/// What the work queue should do with a key after a reconcile pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    RequeueNow,
    RequeueAfter(Duration),
}

impl From<Outcome> for Action {
    fn from(o: Outcome) -> Self {
        match o {
            Outcome::Done => Action::await_change(),
            Outcome::RequeueNow => Action::requeue(Duration::ZERO),
            Outcome::RequeueAfter(d) => Action::requeue(d),
        }
    }
}

pub struct Context<S> {
    pub store: S,
    pub cfg: OperatorConfig,
}

impl<S: ObjectStore> Context<S> {
    pub fn new(store: S, cfg: OperatorConfig) -> Self {
        Self { store, cfg }
    }
}

pub fn error_policy<K, S>(
    obj: Arc<K>,
    err: &ReconcileErr,
    ctx: Arc<Context<S>>,
) -> Action
where
    K: Resource,
{
    warn!(name = %obj.name_any(), error = %err, "reconcile failed; requeueing");
    Action::requeue(ctx.cfg.reconcile.error_requeue())
}

fn scoped_api<K>(client: &Client, ns: Option<&str>) -> Api<K>
where
    K: Resource<
            DynamicType = (),
            Scope = k8s_openapi::NamespaceResourceScope,
        >,
{
    match ns {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Map a change of a secondary object onto the NSOs naming it, using the
/// NSO controller's own cache.
fn secondary_mapper<K>(
    cache: Store<NSO>,
    kind: SecondaryKind,
) -> impl Fn(K) -> Vec<ObjectRef<NSO>> + Send + Sync + 'static
where
    K: Resource,
{
    move |obj: K| {
        let ns = obj.namespace().unwrap_or_default();
        instances_for_change(&cache, kind, &ns, &obj.name_any())
    }
}

pub async fn run_controllers(
    client: Client,
    cfg: OperatorConfig,
) -> anyhow::Result<()> {
    let ns = cfg.watch_namespace.clone();
    let ns = ns.as_deref();
    let ctx = Arc::new(Context::new(KubeStore::new(client.clone()), cfg));

    let nso_ctrl =
        Controller::new(scoped_api::<NSO>(&client, ns), Config::default());
    let cache = nso_ctrl.store();
    let nso_ctrl = nso_ctrl
        .owns(scoped_api::<Service>(&client, ns), Config::default())
        .owns(scoped_api::<StatefulSet>(&client, ns), Config::default())
        .watches(
            scoped_api::<Secret>(&client, ns),
            Config::default(),
            secondary_mapper::<Secret>(cache.clone(), SecondaryKind::Secret),
        )
        .watches(
            scoped_api::<ConfigMap>(&client, ns),
            Config::default(),
            secondary_mapper::<ConfigMap>(cache, SecondaryKind::ConfigMap),
        )
        .shutdown_on_signal()
        .run(
            nso::reconcile::<KubeStore>,
            error_policy::<NSO, KubeStore>,
            ctx.clone(),
        )
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => {
                    info!(nso = %obj, ?action, "reconciled NSO")
                }
                Err(e) => error!(error = ?e, "NSO controller error"),
            }
        });

    let bundle_ctrl = Controller::new(
        scoped_api::<PackageBundle>(&client, ns),
        Config::default(),
    )
    .owns(scoped_api::<PersistentVolumeClaim>(&client, ns), Config::default())
    .owns(scoped_api::<Job>(&client, ns), Config::default())
    .shutdown_on_signal()
    .run(
        package_bundle::reconcile::<KubeStore>,
        error_policy::<PackageBundle, KubeStore>,
        ctx,
    )
    .for_each(|res| async move {
        match res {
            Ok((obj, action)) => {
                info!(bundle = %obj, ?action, "reconciled PackageBundle")
            }
            Err(e) => error!(error = ?e, "PackageBundle controller error"),
        }
    });

    tokio::join!(nso_ctrl, bundle_ctrl);
    Ok(())
}
