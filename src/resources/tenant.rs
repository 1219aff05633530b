//! Tenant module for the v2 API.
//!
//! Tenants are identified by name. The server assigns the login, which is the
//! tenant id returned to the caller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::apiv2::{
    ApiV2Client, Labels, Tenant, TenantCreateRequest, TenantListRequest, TenantUpdateRequest,
    UpdateLabels, UpdateMeta,
};
use crate::config::ApiV2Params;
use crate::error::Result;
use crate::reconciler::ownership::{has_label, with_label};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// Parameters of the tenant module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiV2Params,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Email.
    #[serde(default)]
    pub email: Option<String>,
    /// Labels.
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Tenant adapter.
pub struct TenantResource<'a> {
    client: &'a ApiV2Client,
    params: TenantParams,
}

impl<'a> TenantResource<'a> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(client: &'a ApiV2Client, params: TenantParams) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl Resource for TenantResource<'_> {
    type Entity = Tenant;
    type Patch = TenantUpdateRequest;

    fn kind(&self) -> &'static str {
        "tenant"
    }

    fn identity(&self) -> Result<Identity> {
        Identity::from_parts(None, Some(self.params.name.as_str()), &[], "name must be given")
    }

    fn entity_id(&self, entity: &Tenant) -> String {
        entity.login.clone()
    }

    // Unused: tenants are only addressed by name, so identity never yields an id.
    async fn find(&self, id: &str) -> Result<Option<Tenant>> {
        let tenants = self.client.list_tenants(&TenantListRequest::default()).await?;
        Ok(tenants.into_iter().find(|t| t.login == id))
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<Tenant>> {
        let request = TenantListRequest {
            name: Some(key.key.clone()),
        };
        // The name filter is a substring match on the server.
        let tenants = self.client.list_tenants(&request).await?;
        Ok(tenants
            .into_iter()
            .filter(|t| t.name.as_deref() == Some(key.key.as_str()))
            .collect())
    }

    fn ownership(&self, entity: &Tenant) -> Ownership {
        Ownership::from_marker(has_label(&entity.meta.label_map()))
    }

    fn diff(&self, entity: &Tenant) -> Result<Diff<TenantUpdateRequest>> {
        let mut diff = DiffBuilder::new();
        let mut patch = TenantUpdateRequest {
            login: entity.login.clone(),
            update_meta: UpdateMeta::optimistic(entity.meta.updated_at.clone()),
            description: None,
            email: None,
            avatar_url: None,
            labels: None,
        };

        if diff.compare(
            "description",
            entity.description.as_deref(),
            self.params.description.as_deref(),
        ) {
            patch.description.clone_from(&self.params.description);
        }
        if diff.compare("email", entity.email.as_deref(), self.params.email.as_deref()) {
            patch.email.clone_from(&self.params.email);
        }
        if diff.compare(
            "avatar_url",
            entity.avatar_url.as_deref(),
            self.params.avatar_url.as_deref(),
        ) {
            patch.avatar_url.clone_from(&self.params.avatar_url);
        }
        if let Some(labels) = &self.params.labels {
            let current = entity.meta.label_map();
            let desired = with_label(labels);
            if diff.compare_map("labels", &current, &desired) {
                patch.labels = Some(UpdateLabels::between(&current, &desired));
            }
        }

        Ok(diff.finish(patch))
    }

    async fn create(&self) -> Result<Tenant> {
        let request = TenantCreateRequest {
            name: self.params.name.clone(),
            description: self.params.description.clone(),
            email: self.params.email.clone(),
            avatar_url: self.params.avatar_url.clone(),
            labels: Labels {
                labels: with_label(&self.params.labels.clone().unwrap_or_default()),
            },
        };
        self.client.create_tenant(&request).await
    }

    async fn update(&self, _entity: &Tenant, patch: TenantUpdateRequest) -> Result<Tenant> {
        self.client.update_tenant(&patch).await
    }

    async fn delete(&self, entity: &Tenant) -> Result<Option<Tenant>> {
        self.client.delete_tenant(&entity.login).await.map(Some)
    }

    fn outcome(&self, entity: Option<&Tenant>, changed: bool) -> Outcome {
        Outcome::new(changed)
            .with("id", entity.map(|t| &t.login))
            .with("tenant", entity)
    }
}
