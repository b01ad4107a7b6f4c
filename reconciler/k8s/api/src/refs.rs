use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The cloud provider backing a credential or cluster.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Provider {
    #[serde(rename = "GKE")]
    Gke,
    #[serde(rename = "EKS")]
    Eks,
    #[serde(rename = "AKS")]
    Aks,
}

/// References another console resource, defaulting to the referrer's
/// namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
