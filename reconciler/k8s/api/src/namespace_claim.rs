use super::{refs::ObjectRef, ResourceStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Claims a namespace on a provisioned cluster.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "console.dev",
    version = "v1",
    kind = "NamespaceClaim",
    status = "ResourceStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceClaimSpec {
    pub cluster: ObjectRef,
    pub name: String,
}
