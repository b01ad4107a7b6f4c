use super::{refs::ObjectRef, ResourceStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A cloud service (database, bucket, queue...) provisioned from a plan.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "console.dev",
    version = "v1",
    kind = "ServiceInstance",
    status = "ResourceStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceSpec {
    pub kind: String,
    pub plan: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ObjectRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ObjectRef>,
}
