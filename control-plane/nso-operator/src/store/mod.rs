//! Boundary to the backing object store.
//!
//! Reconcilers only ever talk to the cluster through [`ObjectStore`], which
//! keeps them independent of the transport: [`KubeStore`] drives the API
//! server, [`MemoryStore`] keeps objects in process for tests. Listing goes
//! through [`CachedLister`] so mapping watch events never hits the API server.

mod cache;
mod kube_store;
mod memory;

pub use cache::CachedLister;
pub use kube_store::KubeStore;
pub use memory::{MemoryStore, Op};

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};

/// Namespaced, statically typed API object the store can handle.
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> Object for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch by name. A missing object is `Ok(None)`, not an error.
    async fn get_opt<K: Object>(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<K>, kube::Error>;

    async fn create<K: Object>(
        &self,
        ns: &str,
        obj: &K,
    ) -> Result<K, kube::Error>;

    /// Write the status subresource. The object's resourceVersion must match
    /// the stored one, otherwise the write fails with a conflict.
    async fn replace_status<K: Object>(
        &self,
        ns: &str,
        obj: &K,
    ) -> Result<K, kube::Error>;
}

pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

pub(crate) fn api_error(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    })
}
