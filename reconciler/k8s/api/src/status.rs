use console_reconciler_core::TerminalStates;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, fmt, str::FromStr};

/// The status block shared by every console resource family.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub status: Option<StatusValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StatusCondition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,

    /// One of `True`, `False` or `Unknown`.
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Provisioning status values reported by the console backend.
///
/// Values outside the known vocabulary (typically provider-specific) are
/// preserved as [`StatusValue::Other`] and are never terminal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum StatusValue {
    Pending,
    Success,
    Failure,
    Deleting,
    Deleted,
    Error,
    Warning,
    Other(String),
}

/// The terminal states of a console resource being provisioned.
pub fn provisioning() -> TerminalStates<StatusValue> {
    TerminalStates::new(
        [StatusValue::Success],
        [StatusValue::Failure, StatusValue::Error],
    )
}

// === impl ResourceStatus ===

impl ResourceStatus {
    /// Renders the status message and every condition message.
    pub fn detail(&self) -> Vec<String> {
        self.message
            .iter()
            .cloned()
            .chain(self.conditions.iter().filter_map(|c| {
                let message = c.message.as_deref()?;
                Some(format!("{}: {}", c.type_, message))
            }))
            .collect()
    }
}

// === impl StatusValue ===

impl StatusValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Deleting => "Deleting",
            Self::Deleted => "Deleted",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for StatusValue {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => Self::Pending,
            "Success" => Self::Success,
            "Failure" => Self::Failure,
            "Deleting" => Self::Deleting,
            "Deleted" => Self::Deleted,
            "Error" => Self::Error,
            "Warning" => Self::Warning,
            _ => Self::Other(s),
        }
    }
}

impl From<StatusValue> for String {
    fn from(status: StatusValue) -> Self {
        match status {
            StatusValue::Other(s) => s,
            status => status.as_str().to_string(),
        }
    }
}

impl FromStr for StatusValue {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
