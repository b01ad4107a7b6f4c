//! Console resource families as Kubernetes custom resources.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cloud_credential;
pub mod cluster;
mod fetch;
pub mod namespace_claim;
mod refs;
pub mod service_instance;
mod status;


pub use self::{
    cloud_credential::{CloudCredential, CloudCredentialSpec},
    cluster::{Cluster, ClusterSpec},
    fetch::ApiFetcher,
    namespace_claim::{NamespaceClaim, NamespaceClaimSpec},
    refs::{ObjectRef, Provider},
    service_instance::{ServiceInstance, ServiceInstanceSpec},
    status::{provisioning, ResourceStatus, StatusCondition, StatusValue},
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
pub use kube::{Client, Resource, ResourceExt};

use console_reconciler_core::{ResourceId, Tracked};

/// Every console resource family is tracked by its namespaced name, with the
/// status value reported by the backend.
macro_rules! impl_tracked {
    ($($kind:ty),+ $(,)?) => {$(
        impl Tracked for $kind {
            type Id = ResourceId;
            type Status = StatusValue;

            fn identity(&self) -> ResourceId {
                ResourceId::new(self.namespace().unwrap_or_default(), self.name_any())
            }

            fn status(&self) -> Option<&StatusValue> {
                self.status.as_ref()?.status.as_ref()
            }

            fn status_detail(&self) -> Vec<String> {
                self.status
                    .as_ref()
                    .map(ResourceStatus::detail)
                    .unwrap_or_default()
            }
        }
    )+};
}

impl_tracked!(CloudCredential, Cluster, NamespaceClaim, ServiceInstance);
