//! Project module for the v1 API.
//!
//! Projects are identified by id or by name in global scope. Ownership is
//! carried as an annotation in the project metadata.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiParams;
use crate::error::Result;
use crate::metal::{
    Meta, MetalClient, Project, ProjectCreateRequest, ProjectFindRequest, ProjectUpdateRequest,
};
use crate::reconciler::ownership::{has_label, with_label};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// Parameters of the project module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiParams,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Project id.
    #[serde(default)]
    pub id: Option<String>,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning tenant.
    #[serde(default)]
    pub tenant: Option<String>,
    /// Labels.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

/// Project adapter.
pub struct ProjectResource<'a> {
    client: &'a MetalClient,
    params: ProjectParams,
}

impl<'a> ProjectResource<'a> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(client: &'a MetalClient, params: ProjectParams) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl Resource for ProjectResource<'_> {
    type Entity = Project;
    type Patch = ProjectUpdateRequest;

    fn kind(&self) -> &'static str {
        "project"
    }

    fn identity(&self) -> Result<Identity> {
        Identity::from_parts(
            self.params.id.as_deref(),
            Some(self.params.name.as_str()),
            &[],
            "either id or name must be given",
        )
    }

    fn entity_id(&self, entity: &Project) -> String {
        entity.id().to_string()
    }

    async fn find(&self, id: &str) -> Result<Option<Project>> {
        self.client.find_project(id).await
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<Project>> {
        let query = ProjectFindRequest {
            name: Some(key.key.clone()),
        };
        self.client.find_projects(&query).await
    }

    fn ownership(&self, entity: &Project) -> Ownership {
        Ownership::from_marker(has_label(&entity.meta.annotations))
    }

    fn diff(&self, entity: &Project) -> Result<Diff<ProjectUpdateRequest>> {
        let mut diff = DiffBuilder::new();
        let mut patch = ProjectUpdateRequest {
            meta: Meta {
                id: entity.meta.id.clone(),
                version: entity.meta.version,
                annotations: entity.meta.annotations.clone(),
                labels: entity.meta.labels.clone(),
            },
            description: None,
            tenant_id: None,
        };

        if diff.compare(
            "description",
            entity.description.as_deref(),
            self.params.description.as_deref(),
        ) {
            patch.description.clone_from(&self.params.description);
        }
        if diff.compare(
            "tenant",
            entity.tenant_id.as_deref(),
            self.params.tenant.as_deref(),
        ) {
            patch.tenant_id.clone_from(&self.params.tenant);
        }
        if let Some(labels) = &self.params.labels
            && diff.compare_set("labels", &entity.meta.labels, labels)
        {
            patch.meta.labels.clone_from(labels);
        }

        Ok(diff.finish(patch))
    }

    async fn create(&self) -> Result<Project> {
        let request = ProjectCreateRequest {
            meta: Meta {
                annotations: with_label(&BTreeMap::new()),
                labels: self.params.labels.clone().unwrap_or_default(),
                ..Meta::default()
            },
            name: self.params.name.clone(),
            description: self.params.description.clone(),
            tenant_id: self.params.tenant.clone(),
        };
        self.client.create_project(&request).await
    }

    async fn update(&self, _entity: &Project, patch: ProjectUpdateRequest) -> Result<Project> {
        self.client.update_project(&patch).await
    }

    async fn delete(&self, entity: &Project) -> Result<Option<Project>> {
        self.client.delete_project(entity.id()).await.map(Some)
    }

    fn outcome(&self, entity: Option<&Project>, changed: bool) -> Outcome {
        Outcome::new(changed).with("id", entity.and_then(|p| p.meta.id.as_ref()))
    }
}
