use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kube::Resource;
use serde_json::Value;

use super::{Object, ObjectStore, api_error};

type Key = (String, String, String);

/// Store operations that can be made to fail on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    List,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Key, Value>,
    revision: u64,
    failures: HashMap<(String, Op), String>,
    pending_conflicts: u32,
    status_writes: u32,
}

/// In-process [`ObjectStore`] with API-server-like optimistic concurrency.
///
/// Every write bumps `metadata.resourceVersion`; status writes carrying a
/// stale version fail with 409 the same way the API server rejects them.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn key_of<K: Object>(ns: &str, name: &str) -> Key {
    (K::kind(&()).to_string(), ns.to_string(), name.to_string())
}

fn decode<K: Object>(v: &Value) -> Result<K, kube::Error> {
    serde_json::from_value(v.clone()).map_err(kube::Error::SerdeError)
}

fn encode<K: Object>(obj: &K) -> Result<Value, kube::Error> {
    serde_json::to_value(obj).map_err(kube::Error::SerdeError)
}

fn resource_version(v: &Value) -> Option<&str> {
    v.pointer("/metadata/resourceVersion").and_then(Value::as_str)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every `op` on kind `K` fail with a 500 until cleared.
    pub fn fail_on<K: Object>(&self, op: Op, message: &str) {
        self.lock()
            .failures
            .insert((K::kind(&()).to_string(), op), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Reject the next `n` status writes with a conflict, as if another
    /// writer had updated the object in between.
    pub fn conflict_next_status_writes(&self, n: u32) {
        self.lock().pending_conflicts = n;
    }

    /// Number of status writes that were actually applied.
    pub fn status_writes(&self) -> u32 {
        self.lock().status_writes
    }

    /// Seed or overwrite an object, bypassing failure injection.
    pub fn put<K: Object>(&self, ns: &str, obj: &K) -> Result<K, kube::Error> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut inner = self.lock();
        let mut v = encode(obj)?;
        inner.stamp(&mut v, ns, &name);
        inner.objects.insert(key_of::<K>(ns, &name), v.clone());
        decode(&v)
    }

    /// Overwrite only the status of a stored object, e.g. to simulate a Job
    /// controller reporting progress.
    pub fn set_status<K: Object>(
        &self,
        ns: &str,
        name: &str,
        status: Value,
    ) -> Result<(), kube::Error> {
        let mut inner = self.lock();
        inner.revision += 1;
        let rv = inner.revision.to_string();
        let stored = inner
            .objects
            .get_mut(&key_of::<K>(ns, name))
            .ok_or_else(|| not_found::<K>(name))?;
        stored["status"] = status;
        stored["metadata"]["resourceVersion"] = Value::String(rv);
        Ok(())
    }

    pub fn get<K: Object>(&self, ns: &str, name: &str) -> Option<K> {
        self.lock()
            .objects
            .get(&key_of::<K>(ns, name))
            .and_then(|v| decode(v).ok())
    }

    /// Objects of kind `K` in `ns`, subject to injected `Op::List` failures.
    pub fn list<K: Object>(&self, ns: &str) -> Result<Vec<K>, kube::Error> {
        let kind = K::kind(&()).to_string();
        self.check(&kind, Op::List)?;
        self.lock()
            .objects
            .iter()
            .filter(|((k, n, _), _)| *k == kind && n == ns)
            .map(|(_, v)| decode(v))
            .collect()
    }

    pub fn count<K: Object>(&self, ns: &str) -> usize {
        let kind = K::kind(&()).to_string();
        self.lock()
            .objects
            .keys()
            .filter(|(k, n, _)| *k == kind && n == ns)
            .count()
    }

    fn check(&self, kind: &str, op: Op) -> Result<(), kube::Error> {
        match self.lock().failures.get(&(kind.to_string(), op)) {
            Some(msg) => Err(api_error(500, "InternalError", msg.clone())),
            None => Ok(()),
        }
    }
}

impl Inner {
    fn stamp(&mut self, v: &mut Value, ns: &str, name: &str) {
        self.revision += 1;
        let meta = &mut v["metadata"];
        meta["namespace"] = Value::String(ns.to_string());
        meta["name"] = Value::String(name.to_string());
        meta["resourceVersion"] = Value::String(self.revision.to_string());
        if meta.get("uid").and_then(Value::as_str).is_none() {
            meta["uid"] = Value::String(format!("uid-{}", self.revision));
        }
    }
}

fn not_found<K: Object>(name: &str) -> kube::Error {
    api_error(
        404,
        "NotFound",
        format!("{} \"{}\" not found", K::kind(&()), name),
    )
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_opt<K: Object>(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<K>, kube::Error> {
        self.check(&K::kind(&()), Op::Get)?;
        match self.lock().objects.get(&key_of::<K>(ns, name)) {
            Some(v) => decode(v).map(Some),
            None => Ok(None),
        }
    }

    async fn create<K: Object>(
        &self,
        ns: &str,
        obj: &K,
    ) -> Result<K, kube::Error> {
        self.check(&K::kind(&()), Op::Create)?;
        let name = obj.meta().name.clone().unwrap_or_default();
        let key = key_of::<K>(ns, &name);
        let mut inner = self.lock();
        if inner.objects.contains_key(&key) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("{} \"{}\" already exists", K::kind(&()), name),
            ));
        }
        let mut v = encode(obj)?;
        inner.stamp(&mut v, ns, &name);
        inner.objects.insert(key, v.clone());
        decode(&v)
    }

    async fn replace_status<K: Object>(
        &self,
        ns: &str,
        obj: &K,
    ) -> Result<K, kube::Error> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let incoming = encode(obj)?;
        let mut inner = self.lock();
        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            return Err(api_error(
                409,
                "Conflict",
                format!("operation cannot be fulfilled on \"{}\"", name),
            ));
        }
        inner.revision += 1;
        let rv = inner.revision.to_string();
        let stored = inner
            .objects
            .get_mut(&key_of::<K>(ns, &name))
            .ok_or_else(|| not_found::<K>(&name))?;
        if resource_version(&incoming) != resource_version(stored) {
            return Err(api_error(
                409,
                "Conflict",
                format!(
                    "the object \"{}\" has been modified; please apply your \
                     changes to the latest version",
                    name
                ),
            ));
        }
        stored["status"] = incoming.get("status").cloned().unwrap_or(Value::Null);
        stored["metadata"]["resourceVersion"] = Value::String(rv);
        let out = decode(stored);
        inner.status_writes += 1;
        out
    }
}
