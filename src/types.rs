//! Plain Rust mirrors of the protocol messages exchanged with the host.
//!
//! State travels as `serde_json::Value`; conversion to the wire form happens
//! in the server layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handshake prefix printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "WOODPECKER_PROVIDER";

/// Plugin protocol major version.
pub const PROTOCOL_VERSION: u32 = 6;

/// One attribute's difference between prior and planned state.
///
/// `before` is `None` for attributes that appear, `after` is `None` for
/// attributes that disappear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Dotted attribute path.
    pub path: String,
    /// Prior value.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// An attribute that appears.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// An attribute that disappears.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

fn optional_json(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: optional_json(change.before),
            after: optional_json(change.after),
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Null when the resource is being destroyed.
    pub planned_state: Value,
    /// Per-attribute differences from prior state.
    pub changes: Vec<AttributeChange>,
    /// The host must destroy and recreate the resource to apply this plan.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan with explicit changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether anything differs from prior state.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether this plan destroys the resource.
    pub fn is_destroy(&self) -> bool {
        self.planned_state.is_null()
    }
}

/// A resource produced by `ImportResourceState`.
///
/// The state holds only the key attributes parsed from the import
/// identifier; the host refreshes it with a read right after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Type name of the imported resource.
    pub resource_type: String,
    /// Partial state holding the key attributes.
    pub state: Value,
}

impl ImportedResource {
    /// Pair a type name with its imported state.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

impl From<ImportedResource> for crate::generated::ImportedResource {
    fn from(imported: ImportedResource) -> Self {
        Self {
            resource_type: imported.resource_type,
            state: serde_json::to_vec(&imported.state).unwrap_or_default(),
        }
    }
}

/// Type names and capabilities served in `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Optional protocol features.
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features the provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The provider plans destroys itself instead of leaving it to the host.
    pub plan_destroy: bool,
}

impl From<ServerCapabilities> for crate::generated::ServerCapabilities {
    fn from(caps: ServerCapabilities) -> Self {
        Self {
            plan_destroy: caps.plan_destroy,
        }
    }
}
