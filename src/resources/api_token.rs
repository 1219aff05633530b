//! API token module for the v2 API.
//!
//! Tokens are identified by their description among the caller's API tokens.
//! They cannot carry labels, so ownership is not verified before changes.
//! The secret is only known right after creation and is returned once.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::apiv2::{
    ApiV2Client, MethodPermission, TOKEN_TYPE_API, Token, TokenCreateRequest, TokenUpdateRequest,
    UpdateMeta,
};
use crate::config::ApiV2Params;
use crate::error::{ReconcileError, Result};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// A role granted on a tenant or project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    /// Tenant login or project id.
    pub id: String,
    /// Role name.
    pub role: String,
}

/// Parameters of the API token module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTokenParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiV2Params,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Description, unique among the caller's API tokens.
    pub description: String,
    /// Lifetime such as `8h` or `30d`, used on creation.
    #[serde(default)]
    pub expires: Option<String>,
    /// Admin role.
    #[serde(default)]
    pub admin_role: Option<String>,
    /// Tenant roles.
    #[serde(default)]
    pub tenant_roles: Option<Vec<RoleBinding>>,
    /// Project roles.
    #[serde(default)]
    pub project_roles: Option<Vec<RoleBinding>>,
    /// Method permissions.
    #[serde(default)]
    pub permissions: Option<Vec<MethodPermission>>,
}

/// A token together with its secret, if just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    /// Token record.
    pub token: Token,
    /// Bearer secret, only set on creation.
    pub secret: Option<String>,
}

/// Converts a duration such as `1d12h` into protobuf JSON form (`"129600s"`).
///
/// Units are `w`, `d`, `h`, `m` and `s`; a bare number means seconds.
///
/// # Errors
///
/// Returns `InvalidArguments` for an empty, zero or malformed duration.
pub fn parse_duration(input: &str) -> Result<String> {
    let invalid =
        || ReconcileError::invalid_arguments(format!("invalid duration for expires: '{input}'"));

    let input = input.trim();
    if input.is_empty() {
        return Err(invalid().into());
    }
    if let Ok(seconds) = input.parse::<u64>() {
        return if seconds == 0 {
            Err(invalid().into())
        } else {
            Ok(format!("{seconds}s"))
        };
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let unit: u64 = match c {
            'w' => 7 * 24 * 3600,
            'd' => 24 * 3600,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid().into()),
        };
        let value: u64 = number.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        number.clear();
    }

    if !number.is_empty() || total == 0 {
        return Err(invalid().into());
    }
    Ok(format!("{total}s"))
}

fn role_map(bindings: &[RoleBinding]) -> BTreeMap<String, String> {
    bindings
        .iter()
        .map(|b| (b.id.clone(), b.role.clone()))
        .collect()
}

/// Permissions in a canonical order for comparison.
fn normalized(permissions: &[MethodPermission]) -> Vec<MethodPermission> {
    let mut result: Vec<MethodPermission> = permissions
        .iter()
        .map(|p| {
            let mut methods = p.methods.clone();
            methods.sort();
            methods.dedup();
            MethodPermission {
                subject: p.subject.clone(),
                methods,
            }
        })
        .collect();
    result.sort();
    result
}

/// API token adapter.
pub struct ApiTokenResource<'a> {
    client: &'a ApiV2Client,
    params: ApiTokenParams,
}

impl<'a> ApiTokenResource<'a> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(client: &'a ApiV2Client, params: ApiTokenParams) -> Self {
        Self { client, params }
    }

    async fn api_tokens(&self) -> Result<Vec<Token>> {
        let tokens = self.client.list_tokens().await?;
        Ok(tokens
            .into_iter()
            .filter(|t| t.token_type == TOKEN_TYPE_API)
            .collect())
    }
}

#[async_trait]
impl Resource for ApiTokenResource<'_> {
    type Entity = ApiToken;
    type Patch = TokenUpdateRequest;

    fn kind(&self) -> &'static str {
        "api token"
    }

    fn identity(&self) -> Result<Identity> {
        Identity::from_parts(
            None,
            Some(self.params.description.as_str()),
            &[],
            "description must be given",
        )
    }

    fn validate(&self) -> Result<()> {
        if let Some(expires) = &self.params.expires {
            parse_duration(expires)?;
        }
        Ok(())
    }

    fn entity_id(&self, entity: &ApiToken) -> String {
        entity.token.uuid.clone()
    }

    async fn find(&self, id: &str) -> Result<Option<ApiToken>> {
        Ok(self
            .api_tokens()
            .await?
            .into_iter()
            .find(|t| t.uuid == id)
            .map(|token| ApiToken {
                token,
                secret: None,
            }))
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<ApiToken>> {
        Ok(self
            .api_tokens()
            .await?
            .into_iter()
            .filter(|t| t.description == key.key)
            .map(|token| ApiToken {
                token,
                secret: None,
            })
            .collect())
    }

    fn ownership(&self, _entity: &ApiToken) -> Ownership {
        Ownership::Unsupported
    }

    fn diff(&self, entity: &ApiToken) -> Result<Diff<TokenUpdateRequest>> {
        let token = &entity.token;
        let mut diff = DiffBuilder::new();
        let mut patch = TokenUpdateRequest {
            uuid: token.uuid.clone(),
            update_meta: UpdateMeta::optimistic(token.meta.updated_at.clone()),
            permissions: token.permissions.clone(),
            project_roles: None,
            tenant_roles: None,
            admin_role: None,
        };

        if diff.compare(
            "admin_role",
            token.admin_role.as_deref(),
            self.params.admin_role.as_deref(),
        ) {
            patch.admin_role.clone_from(&self.params.admin_role);
        }
        if let Some(bindings) = &self.params.tenant_roles {
            let desired = role_map(bindings);
            if diff.compare_map("tenant_roles", &token.tenant_roles, &desired) {
                patch.tenant_roles = Some(desired);
            }
        }
        if let Some(bindings) = &self.params.project_roles {
            let desired = role_map(bindings);
            if diff.compare_map("project_roles", &token.project_roles, &desired) {
                patch.project_roles = Some(desired);
            }
        }
        if let Some(permissions) = &self.params.permissions {
            let desired = normalized(permissions);
            if diff.compare(
                "permissions",
                Some(&normalized(&token.permissions)),
                Some(&desired),
            ) {
                patch.permissions = desired;
            }
        }

        Ok(diff.finish(patch))
    }

    async fn create(&self) -> Result<ApiToken> {
        let request = TokenCreateRequest {
            description: self.params.description.clone(),
            permissions: self.params.permissions.clone().unwrap_or_default(),
            project_roles: self
                .params
                .project_roles
                .as_deref()
                .map(role_map)
                .unwrap_or_default(),
            tenant_roles: self
                .params
                .tenant_roles
                .as_deref()
                .map(role_map)
                .unwrap_or_default(),
            admin_role: self.params.admin_role.clone(),
            expires: self
                .params
                .expires
                .as_deref()
                .map(parse_duration)
                .transpose()?,
        };

        let response = self.client.create_token(&request).await?;
        Ok(ApiToken {
            token: response.token,
            secret: Some(response.secret),
        })
    }

    async fn update(&self, _entity: &ApiToken, patch: TokenUpdateRequest) -> Result<ApiToken> {
        let token = self.client.update_token(&patch).await?;
        Ok(ApiToken {
            token,
            secret: None,
        })
    }

    async fn delete(&self, entity: &ApiToken) -> Result<Option<ApiToken>> {
        self.client.revoke_token(&entity.token.uuid).await?;
        Ok(None)
    }

    fn outcome(&self, entity: Option<&ApiToken>, changed: bool) -> Outcome {
        Outcome::new(changed)
            .with("id", entity.map(|t| &t.token.uuid))
            .with("token", entity.map(|t| &t.token))
            .with("secret", entity.and_then(|t| t.secret.as_ref()))
    }
}
