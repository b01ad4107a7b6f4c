use super::{
    refs::{ObjectRef, Provider},
    ResourceStatus,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Kubernetes cluster provisioned through a cloud credential.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "console.dev",
    version = "v1",
    kind = "Cluster",
    status = "ResourceStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub provider: Provider,
    pub plan: String,
    pub credentials: ObjectRef,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, String>,
}
