use super::{
    refs::{ObjectRef, Provider},
    ResourceStatus,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Credentials for a cloud provider account, validated by the backend once
/// they are created or updated.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "console.dev",
    version = "v1",
    kind = "CloudCredential",
    status = "ResourceStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CloudCredentialSpec {
    pub provider: Provider,

    /// The provider account, project or subscription the credential grants
    /// access to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// The secret holding the credential material.
    pub secret_ref: ObjectRef,
}
