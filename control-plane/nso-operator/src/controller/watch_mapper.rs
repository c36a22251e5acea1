//! Maps changes of Secrets and ConfigMaps onto the NSO instances that name
//! them in their spec. Instances are looked up in a local cache only.

use kube::ResourceExt;
use kube::runtime::reflector::ObjectRef;
use tracing::{info, instrument, warn};

use crate::crd::nso::NSO;
use crate::store::CachedLister;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecondaryKind {
    Secret,
    ConfigMap,
}

/// Whether `nso` refers to the object `name` of the given kind.
pub fn references(nso: &NSO, kind: SecondaryKind, name: &str) -> bool {
    match kind {
        SecondaryKind::Secret => {
            nso.spec.admin_credentials.password_secret_ref == name
        }
        SecondaryKind::ConfigMap => nso.spec.nso_config_ref == name,
    }
}

/// Reconcile triggers for every NSO in `ns` that references `name`.
///
/// A failed listing yields no triggers; the change is dropped.
#[instrument(level = "debug", skip(cache))]
pub fn instances_for_change<L: CachedLister<NSO>>(
    cache: &L,
    kind: SecondaryKind,
    ns: &str,
    name: &str,
) -> Vec<ObjectRef<NSO>> {
    let instances = match cache.list_cached(ns) {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "failed to list NSO instances; dropping change");
            return Vec::new();
        }
    };

    instances
        .iter()
        .filter(|nso| references(nso, kind, name))
        .map(|nso| {
            info!(nso = %nso.name_any(), "referenced object changed; enqueueing");
            ObjectRef::new(&nso.name_any()).within(ns)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kube::runtime::{reflector, watcher};

    use super::*;
    use crate::crd::nso::{Credentials, NSOSpec};
    use crate::store::{MemoryStore, Op};

    fn nso(name: &str, secret: &str, config: &str) -> NSO {
        NSO::new(
            name,
            NSOSpec {
                image: "cisco/nso:6.4".into(),
                service_name: format!("{name}-svc"),
                replicas: 1,
                label_selector: BTreeMap::from([(
                    "app".to_string(),
                    name.to_string(),
                )]),
                ports: vec![],
                nso_config_ref: config.into(),
                admin_credentials: Credentials {
                    username: "admin".into(),
                    password_secret_ref: secret.into(),
                },
                env: vec![],
                volumes: vec![],
                volume_mounts: vec![],
            },
        )
    }

    fn names(refs: &[ObjectRef<NSO>]) -> Vec<String> {
        let mut out: Vec<String> = refs.iter().map(|r| r.name.clone()).collect();
        out.sort();
        out
    }

    #[test]
    fn secret_change_targets_instances_using_it() {
        let store = MemoryStore::new();
        store.put("nso", &nso("a", "shared", "cfg-a")).unwrap();
        store.put("nso", &nso("b", "shared", "cfg-b")).unwrap();
        store.put("nso", &nso("c", "other", "shared")).unwrap();

        let refs =
            instances_for_change(&store, SecondaryKind::Secret, "nso", "shared");
        assert_eq!(names(&refs), vec!["a", "b"]);
        assert!(refs.iter().all(|r| r.namespace.as_deref() == Some("nso")));
    }

    #[test]
    fn config_map_change_matches_config_ref_only() {
        let store = MemoryStore::new();
        store.put("nso", &nso("a", "cfg-b", "cfg-a")).unwrap();
        store.put("nso", &nso("b", "s", "cfg-b")).unwrap();

        let refs =
            instances_for_change(&store, SecondaryKind::ConfigMap, "nso", "cfg-b");
        assert_eq!(names(&refs), vec!["b"]);
    }

    #[test]
    fn other_namespaces_are_ignored() {
        let store = MemoryStore::new();
        store.put("nso", &nso("a", "shared", "cfg")).unwrap();
        store.put("lab", &nso("b", "shared", "cfg")).unwrap();

        let refs =
            instances_for_change(&store, SecondaryKind::Secret, "lab", "shared");
        assert_eq!(names(&refs), vec!["b"]);
        assert_eq!(refs[0].namespace.as_deref(), Some("lab"));
    }

    #[test]
    fn list_failure_yields_nothing() {
        let store = MemoryStore::new();
        store.put("nso", &nso("a", "shared", "cfg")).unwrap();
        store.fail_on::<NSO>(Op::List, "apiserver down");

        let refs =
            instances_for_change(&store, SecondaryKind::Secret, "nso", "shared");
        assert!(refs.is_empty());
    }

    #[test]
    fn triggers_come_from_the_reflector_cache() {
        let (cache, mut writer) = reflector::store::<NSO>();
        for (ns, n) in [("nso", "a"), ("nso", "b"), ("lab", "c")] {
            let mut obj = nso(n, if n == "b" { "other" } else { "shared" }, "cfg");
            obj.metadata.namespace = Some(ns.to_string());
            writer.apply_watcher_event(&watcher::Event::Apply(obj));
        }

        let refs =
            instances_for_change(&cache, SecondaryKind::Secret, "nso", "shared");
        assert_eq!(names(&refs), vec!["a"]);
        assert_eq!(refs[0].namespace.as_deref(), Some("nso"));
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let n = nso("a", "secret", "cfg");
        assert!(!references(&n, SecondaryKind::Secret, "cfg"));
        assert!(!references(&n, SecondaryKind::ConfigMap, "secret"));
        assert!(references(&n, SecondaryKind::ConfigMap, "cfg"));
    }
}
