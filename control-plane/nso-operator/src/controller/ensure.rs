use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use crate::builders::ChildResource;
use crate::store::{Object, ObjectStore};

/// Create `desired` unless an object of the same kind and name already exists.
///
/// Returns `true` when the object was created by this call. Existing objects
/// are left untouched; no field of theirs is compared or patched. Fetch and
/// create errors are handed back as-is.
#[instrument(skip_all, fields(kind = %K::kind(&()), name = %desired.name_any()))]
pub async fn ensure_exists<S, K>(
    store: &S,
    desired: &K,
) -> Result<bool, kube::Error>
where
    S: ObjectStore,
    K: Object,
{
    let ns = desired.namespace().unwrap_or_else(|| "default".to_string());
    let name = desired.name_any();

    match store.get_opt::<K>(&ns, &name).await {
        Ok(Some(_)) => {
            debug!(%ns, "skip: resource already exists");
            Ok(false)
        }
        Ok(None) => {
            info!(%ns, "creating resource");
            if let Err(e) = store.create(&ns, desired).await {
                error!(%ns, error = %e, "failed to create resource");
                return Err(e);
            }
            Ok(true)
        }
        Err(e) => {
            error!(%ns, error = %e, "failed to get resource");
            Err(e)
        }
    }
}

pub async fn ensure_child<S: ObjectStore>(
    store: &S,
    child: &ChildResource,
) -> Result<bool, kube::Error> {
    match child {
        ChildResource::Service(o) => ensure_exists(store, o).await,
        ChildResource::StatefulSet(o) => ensure_exists(store, o).await,
        ChildResource::Claim(o) => ensure_exists(store, o).await,
        ChildResource::Job(o) => ensure_exists(store, o).await,
    }
}
