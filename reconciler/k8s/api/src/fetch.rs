use console_reconciler_core::{FetchResource, ResourceId, Tracked};
use k8s_openapi::NamespaceResourceScope;
use kube::{api::Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::{fmt, marker::PhantomData};

/// Reads namespaced resources from the Kubernetes API.
///
/// A resource that no longer exists is reported as `Ok(None)`.
pub struct ApiFetcher<K> {
    client: Client,
    _marker: PhantomData<fn() -> K>,
}

// === impl ApiFetcher ===

impl<K> ApiFetcher<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }
}

impl<K> Clone for ApiFetcher<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> fmt::Debug for ApiFetcher<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiFetcher")
            .field("kind", &std::any::type_name::<K>())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<K> FetchResource<K> for ApiFetcher<K>
where
    K: Tracked<Id = ResourceId>,
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    K: Clone + DeserializeOwned + fmt::Debug,
{
    async fn fetch(&self, id: &ResourceId) -> anyhow::Result<Option<K>> {
        let api = Api::<K>::namespaced(self.client.clone(), &id.namespace);
        let resource = api.get_opt(&id.name).await?;
        if resource.is_none() {
            tracing::trace!(%id, "Not found");
        }
        Ok(resource)
    }
}
