#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::ServicePort;
use kube::{Client, api::Api};
use nso_operator::config::OperatorConfig;
use nso_operator::controller::Context;
use nso_operator::crd::nso::{Credentials, NSO, NSOSpec};
use nso_operator::crd::package_bundle::{
    AccessCredentials, OriginType, PackageBundle, PackageBundleSpec,
    PackageSource,
};
use nso_operator::store::MemoryStore;
use tokio::task::JoinHandle;

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

pub fn memory_ctx() -> Context<MemoryStore> {
    Context::new(MemoryStore::new(), OperatorConfig::default())
}

pub fn nso_spec(name: &str) -> NSOSpec {
    NSOSpec {
        image: "cisco/nso:6.4".into(),
        service_name: format!("{name}-svc"),
        replicas: 1,
        label_selector: BTreeMap::from([("app".to_string(), name.to_string())]),
        ports: vec![ServicePort {
            name: Some("netconf".into()),
            port: 2022,
            ..Default::default()
        }],
        nso_config_ref: format!("{name}-config"),
        admin_credentials: Credentials {
            username: "admin".into(),
            password_secret_ref: format!("{name}-admin"),
        },
        env: vec![],
        volumes: vec![],
        volume_mounts: vec![],
    }
}

pub fn nso(name: &str) -> NSO {
    NSO::new(name, nso_spec(name))
}

pub fn bundle_spec(target: &str, url: &str) -> PackageBundleSpec {
    PackageBundleSpec {
        target_name: target.into(),
        storage_size: None,
        origin: OriginType::Scm,
        insecure_tls: None,
        credentials: AccessCredentials::default(),
        source: PackageSource {
            url: url.into(),
            branch: None,
            path: None,
        },
    }
}

pub fn bundle(name: &str, target: &str, url: &str) -> PackageBundle {
    PackageBundle::new(name, bundle_spec(target, url))
}

pub async fn wait_for<K, F>(
    api: &Api<K>,
    name: &str,
    what: &str,
    pred: F,
) -> K
where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
    F: Fn(&K) -> bool,
{
    for _ in 0..90 {
        if let Ok(Some(obj)) = api.get_opt(name).await {
            if pred(&obj) {
                return obj;
            }
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    panic!("{what} {name} not ready in time");
}

// RAII guard to ensure controller abort + cleanup
pub struct ControllerGuard {
    ns: String,
    nso: Option<String>,
    bundle: Option<String>,
    client: Client,
    ctrl: Option<JoinHandle<()>>,
}

impl ControllerGuard {
    pub fn new(ns: &str, client: Client) -> Self {
        Self {
            ns: ns.to_string(),
            nso: None,
            bundle: None,
            client,
            ctrl: None,
        }
    }
    pub fn with_nso(mut self, name: &str) -> Self {
        self.nso = Some(name.to_string());
        self
    }
    pub fn with_bundle(mut self, name: &str) -> Self {
        self.bundle = Some(name.to_string());
        self
    }
    pub fn with_controller(mut self, ctrl: JoinHandle<()>) -> Self {
        self.ctrl = Some(ctrl);
        self
    }
}

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        if let Some(h) = self.ctrl.take() {
            h.abort();
        }
        // Children go away through owner references.
        let client = self.client.clone();
        let ns = self.ns.clone();
        let nso = self.nso.take();
        let bundle = self.bundle.take();
        tokio::spawn(async move {
            if let Some(name) = nso {
                let api: Api<NSO> = Api::namespaced(client.clone(), &ns);
                let _ = api.delete(&name, &Default::default()).await;
            }
            if let Some(name) = bundle {
                let api: Api<PackageBundle> = Api::namespaced(client, &ns);
                let _ = api.delete(&name, &Default::default()).await;
            }
        });
    }
}
