//! metal-apiserver v2 types.
//!
//! Messages use the protobuf JSON mapping: camelCase field names, enums as
//! their string names, durations as `"<seconds>s"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Locking strategy that makes the server compare `updatedAt`.
pub const OPTIMISTIC_LOCKING: &str = "OPTIMISTIC_LOCKING_STRATEGY_CLIENT";

/// Token type of API tokens.
pub const TOKEN_TYPE_API: &str = "TOKEN_TYPE_API";

/// Label wrapper message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// Key/value labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Entity metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp, the version marker for optimistic locking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Meta {
    /// Labels of the entity, empty if none.
    #[must_use]
    pub fn label_map(&self) -> BTreeMap<String, String> {
        self.labels
            .as_ref()
            .map(|l| l.labels.clone())
            .unwrap_or_default()
    }
}

/// Update metadata sent with every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeta {
    /// Locking strategy.
    pub locking_strategy: String,
    /// The `updatedAt` read before the update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UpdateMeta {
    /// Optimistic locking against the given version.
    #[must_use]
    pub fn optimistic(updated_at: Option<String>) -> Self {
        Self {
            locking_strategy: OPTIMISTIC_LOCKING.to_string(),
            updated_at,
        }
    }
}

/// Label changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateLabels {
    /// Labels to add or overwrite.
    pub update: Labels,
    /// Label keys to remove.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl UpdateLabels {
    /// Computes the changes turning `current` into `desired`.
    #[must_use]
    pub fn between(current: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> Self {
        Self {
            update: Labels {
                labels: desired
                    .iter()
                    .filter(|(k, v)| current.get(*k) != Some(*v))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
            remove: current
                .keys()
                .filter(|k| !desired.contains_key(*k))
                .cloned()
                .collect(),
        }
    }
}

// -------------------------------------------------------------------------
// Tenants
// -------------------------------------------------------------------------

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Login, the tenant id.
    pub login: String,
    /// Metadata.
    #[serde(default)]
    pub meta: Meta,
    /// Name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Tenant list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantListRequest {
    /// Name filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Tenant create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCreateRequest {
    /// Name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Labels including the ownership label.
    pub labels: Labels,
}

/// Tenant update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantUpdateRequest {
    /// Tenant login.
    pub login: String,
    /// Locking metadata.
    pub update_meta: UpdateMeta,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Label changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<UpdateLabels>,
}

// -------------------------------------------------------------------------
// Projects
// -------------------------------------------------------------------------

/// A project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project id.
    pub uuid: String,
    /// Metadata.
    #[serde(default)]
    pub meta: Meta,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning tenant login.
    #[serde(default)]
    pub tenant: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Project list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectListRequest {
    /// Name filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tenant filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// Project create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreateRequest {
    /// Owning tenant login.
    pub login: String,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Labels including the ownership label.
    pub labels: Labels,
}

/// Project update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdateRequest {
    /// Project id.
    pub project: String,
    /// Locking metadata.
    pub update_meta: UpdateMeta,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Label changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<UpdateLabels>,
}

// -------------------------------------------------------------------------
// Tokens
// -------------------------------------------------------------------------

/// Methods a token may call on a subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodPermission {
    /// Subject, e.g. a project id or `*`.
    pub subject: String,
    /// Allowed methods.
    #[serde(default)]
    pub methods: Vec<String>,
}

/// An API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token id.
    pub uuid: String,
    /// Owning user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Description, the natural key.
    #[serde(default)]
    pub description: String,
    /// Method permissions.
    #[serde(default)]
    pub permissions: Vec<MethodPermission>,
    /// Expiration timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Issue timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    /// Token type.
    #[serde(default)]
    pub token_type: String,
    /// Project roles by project id.
    #[serde(default)]
    pub project_roles: BTreeMap<String, String>,
    /// Tenant roles by tenant login.
    #[serde(default)]
    pub tenant_roles: BTreeMap<String, String>,
    /// Admin role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_role: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub meta: Meta,
}

/// Token create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateRequest {
    /// Description.
    pub description: String,
    /// Method permissions.
    pub permissions: Vec<MethodPermission>,
    /// Project roles.
    pub project_roles: BTreeMap<String, String>,
    /// Tenant roles.
    pub tenant_roles: BTreeMap<String, String>,
    /// Admin role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_role: Option<String>,
    /// Lifetime as protobuf duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// Token create response. The secret is only ever returned here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenCreateResponse {
    /// The created token.
    pub token: Token,
    /// The bearer secret.
    pub secret: String,
}

/// Token update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUpdateRequest {
    /// Token id.
    pub uuid: String,
    /// Locking metadata.
    pub update_meta: UpdateMeta,
    /// Method permissions, always sent since the server replaces them.
    pub permissions: Vec<MethodPermission>,
    /// Project roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_roles: Option<BTreeMap<String, String>>,
    /// Tenant roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_roles: Option<BTreeMap<String, String>>,
    /// Admin role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_role: Option<String>,
}
