use std::sync::Arc;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument};

use super::{Context, Outcome, ReconcileErr};
use crate::builders::{ChildResource, service_for, statefulset_for};
use crate::controller::ensure::ensure_child;
use crate::crd::nso::NSO;
use crate::store::ObjectStore;

#[instrument(skip_all, fields(ns = %obj.namespace().unwrap_or_else(|| "default".into()), name = %obj.name_any()))]
pub async fn reconcile<S: ObjectStore>(
    obj: Arc<NSO>,
    ctx: Arc<Context<S>>,
) -> Result<Action, ReconcileErr> {
    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    reconcile_nso(&ctx, &ns, &obj.name_any()).await.map(Action::from)
}

/// One pass over an NSO instance: make sure the headless Service exists,
/// then the StatefulSet. At most one child is created per pass; the key is
/// requeued right away so the next child follows.
pub async fn reconcile_nso<S: ObjectStore>(
    ctx: &Context<S>,
    ns: &str,
    name: &str,
) -> Result<Outcome, ReconcileErr> {
    let Some(nso) = ctx.store.get_opt::<NSO>(ns, name).await? else {
        debug!("NSO not found; assuming it was deleted");
        return Ok(Outcome::Done);
    };

    let children = [
        ChildResource::Service(service_for(&nso)),
        ChildResource::StatefulSet(statefulset_for(&nso)),
    ];
    for child in &children {
        if ensure_child(&ctx.store, child).await? {
            info!(kind = child.kind(), child = %child.name(), "created child");
            return Ok(Outcome::RequeueNow);
        }
    }

    debug!("all children present");
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::StatefulSet;
    use k8s_openapi::api::core::v1::{Service, ServicePort};

    use super::*;
    use crate::config::OperatorConfig;
    use crate::crd::nso::{Credentials, NSOSpec};
    use crate::store::{MemoryStore, Op};

    fn ctx() -> Context<MemoryStore> {
        Context::new(MemoryStore::new(), OperatorConfig::default())
    }

    fn seed(store: &MemoryStore, name: &str) -> NSO {
        let nso = NSO::new(
            name,
            NSOSpec {
                image: "cisco/nso:6.4".into(),
                service_name: format!("{name}-svc"),
                replicas: 1,
                label_selector: BTreeMap::from([(
                    "app".to_string(),
                    name.to_string(),
                )]),
                ports: vec![ServicePort {
                    port: 2022,
                    ..Default::default()
                }],
                nso_config_ref: "ncs-config".into(),
                admin_credentials: Credentials {
                    username: "admin".into(),
                    password_secret_ref: "nso-admin".into(),
                },
                env: vec![],
                volumes: vec![],
                volume_mounts: vec![],
            },
        );
        store.put("nso", &nso).unwrap()
    }

    #[tokio::test]
    async fn missing_instance_is_done() {
        let ctx = ctx();
        let out = reconcile_nso(&ctx, "nso", "ghost").await.unwrap();
        assert_eq!(out, Outcome::Done);
        assert_eq!(ctx.store.count::<Service>("nso"), 0);
    }

    #[tokio::test]
    async fn creates_service_then_statefulset() {
        let ctx = ctx();
        seed(&ctx.store, "alpha");

        let out = reconcile_nso(&ctx, "nso", "alpha").await.unwrap();
        assert_eq!(out, Outcome::RequeueNow);
        assert!(ctx.store.get::<Service>("nso", "alpha-svc").is_some());
        assert_eq!(ctx.store.count::<StatefulSet>("nso"), 0);

        let out = reconcile_nso(&ctx, "nso", "alpha").await.unwrap();
        assert_eq!(out, Outcome::RequeueNow);
        assert!(ctx.store.get::<StatefulSet>("nso", "alpha").is_some());

        let out = reconcile_nso(&ctx, "nso", "alpha").await.unwrap();
        assert_eq!(out, Outcome::Done);
        assert_eq!(ctx.store.count::<Service>("nso"), 1);
        assert_eq!(ctx.store.count::<StatefulSet>("nso"), 1);
    }

    #[tokio::test]
    async fn children_are_owned_by_the_instance() {
        let ctx = ctx();
        let nso = seed(&ctx.store, "alpha");
        reconcile_nso(&ctx, "nso", "alpha").await.unwrap();
        reconcile_nso(&ctx, "nso", "alpha").await.unwrap();

        let uid = nso.metadata.uid.unwrap();
        let svc = ctx.store.get::<Service>("nso", "alpha-svc").unwrap();
        let sts = ctx.store.get::<StatefulSet>("nso", "alpha").unwrap();
        assert_eq!(svc.owner_references()[0].uid, uid);
        assert_eq!(sts.owner_references()[0].uid, uid);
    }

    #[tokio::test]
    async fn fetch_error_is_propagated() {
        let ctx = ctx();
        seed(&ctx.store, "alpha");
        ctx.store.fail_on::<NSO>(Op::Get, "apiserver down");
        let err = reconcile_nso(&ctx, "nso", "alpha").await.unwrap_err();
        assert!(matches!(err, ReconcileErr::Kube(_)));
    }

    #[tokio::test]
    async fn service_create_error_stops_the_pass() {
        let ctx = ctx();
        seed(&ctx.store, "alpha");
        ctx.store.fail_on::<Service>(Op::Create, "quota exceeded");
        assert!(reconcile_nso(&ctx, "nso", "alpha").await.is_err());
        assert_eq!(ctx.store.count::<StatefulSet>("nso"), 0);
    }

    #[tokio::test]
    async fn existing_children_are_not_modified() {
        let ctx = ctx();
        let nso = seed(&ctx.store, "alpha");
        let mut svc = service_for(&nso);
        svc.metadata.labels = Some(BTreeMap::from([(
            "edited".to_string(),
            "by-hand".to_string(),
        )]));
        ctx.store.put("nso", &svc).unwrap();

        let out = reconcile_nso(&ctx, "nso", "alpha").await.unwrap();
        assert_eq!(out, Outcome::RequeueNow);
        let stored = ctx.store.get::<Service>("nso", "alpha-svc").unwrap();
        assert!(stored.labels().contains_key("edited"));
        assert!(ctx.store.get::<StatefulSet>("nso", "alpha").is_some());
    }
}
