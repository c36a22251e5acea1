use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, PostParams},
};
use tracing::trace;

use super::{Object, ObjectStore};

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: Object>(&self, ns: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), ns)
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_opt<K: Object>(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<K>, kube::Error> {
        trace!(kind = %K::kind(&()), %ns, %name, "store: get");
        self.api::<K>(ns).get_opt(name).await
    }

    async fn create<K: Object>(
        &self,
        ns: &str,
        obj: &K,
    ) -> Result<K, kube::Error> {
        trace!(kind = %K::kind(&()), %ns, "store: create");
        self.api::<K>(ns).create(&PostParams::default(), obj).await
    }

    async fn replace_status<K: Object>(
        &self,
        ns: &str,
        obj: &K,
    ) -> Result<K, kube::Error> {
        let name = obj.meta().name.clone().unwrap_or_default();
        trace!(kind = %K::kind(&()), %ns, %name, "store: replace status");
        let data = serde_json::to_vec(obj).map_err(kube::Error::SerdeError)?;
        self.api::<K>(ns)
            .replace_status(&name, &PostParams::default(), data)
            .await
    }
}
