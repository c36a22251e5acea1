use std::sync::Arc;

use kube::ResourceExt;
use kube::runtime::reflector::Store;

use super::{MemoryStore, Object};

/// Namespace-scoped listing answered from local state.
///
/// Implemented by the controller's reflector cache, which never fails, and by
/// [`MemoryStore`], which honours injected `Op::List` failures.
pub trait CachedLister<K>: Send + Sync {
    fn list_cached(&self, ns: &str) -> Result<Vec<Arc<K>>, kube::Error>;
}

impl<K: Object> CachedLister<K> for Store<K> {
    fn list_cached(&self, ns: &str) -> Result<Vec<Arc<K>>, kube::Error> {
        Ok(self
            .state()
            .into_iter()
            .filter(|obj| obj.namespace().as_deref() == Some(ns))
            .collect())
    }
}

impl<K: Object> CachedLister<K> for MemoryStore {
    fn list_cached(&self, ns: &str) -> Result<Vec<Arc<K>>, kube::Error> {
        Ok(self.list::<K>(ns)?.into_iter().map(Arc::new).collect())
    }
}
