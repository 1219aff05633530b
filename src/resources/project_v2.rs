//! Project module for the v2 API.
//!
//! Projects are identified by name within their tenant.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::apiv2::{
    ApiV2Client, Labels, Project, ProjectCreateRequest, ProjectListRequest, ProjectUpdateRequest,
    UpdateLabels, UpdateMeta,
};
use crate::config::ApiV2Params;
use crate::error::Result;
use crate::reconciler::ownership::{has_label, with_label};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// Parameters of the v2 project module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectV2Params {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiV2Params,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Name.
    pub name: String,
    /// Owning tenant login.
    pub tenant: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Labels.
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// v2 project adapter.
pub struct ProjectV2Resource<'a> {
    client: &'a ApiV2Client,
    params: ProjectV2Params,
}

impl<'a> ProjectV2Resource<'a> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(client: &'a ApiV2Client, params: ProjectV2Params) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl Resource for ProjectV2Resource<'_> {
    type Entity = Project;
    type Patch = ProjectUpdateRequest;

    fn kind(&self) -> &'static str {
        "project"
    }

    fn identity(&self) -> Result<Identity> {
        Identity::from_parts(
            None,
            Some(self.params.name.as_str()),
            &[("tenant", Some(self.params.tenant.as_str()))],
            "name and tenant must be given",
        )
    }

    fn entity_id(&self, entity: &Project) -> String {
        entity.uuid.clone()
    }

    // Unused: projects are only addressed by name within the tenant, so
    // identity never yields an id.
    async fn find(&self, id: &str) -> Result<Option<Project>> {
        let request = ProjectListRequest {
            name: None,
            tenant: Some(self.params.tenant.clone()),
        };
        let projects = self.client.list_projects(&request).await?;
        Ok(projects.into_iter().find(|p| p.uuid == id))
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<Project>> {
        let request = ProjectListRequest {
            name: Some(key.key.clone()),
            tenant: key.scope_value("tenant").map(String::from),
        };
        let projects = self.client.list_projects(&request).await?;
        Ok(projects.into_iter().filter(|p| p.name == key.key).collect())
    }

    fn ownership(&self, entity: &Project) -> Ownership {
        Ownership::from_marker(has_label(&entity.meta.label_map()))
    }

    fn diff(&self, entity: &Project) -> Result<Diff<ProjectUpdateRequest>> {
        let mut diff = DiffBuilder::new();
        let mut patch = ProjectUpdateRequest {
            project: entity.uuid.clone(),
            update_meta: UpdateMeta::optimistic(entity.meta.updated_at.clone()),
            description: None,
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

    async fn create(&self) -> Result<Project> {
        let request = ProjectCreateRequest {
            login: self.params.tenant.clone(),
            name: self.params.name.clone(),
            description: self.params.description.clone(),
            avatar_url: self.params.avatar_url.clone(),
            labels: Labels {
                labels: with_label(&self.params.labels.clone().unwrap_or_default()),
            },
        };
        self.client.create_project(&request).await
    }

    async fn update(&self, _entity: &Project, patch: ProjectUpdateRequest) -> Result<Project> {
        self.client.update_project(&patch).await
    }

    async fn delete(&self, entity: &Project) -> Result<Option<Project>> {
        self.client.delete_project(&entity.uuid).await.map(Some)
    }

    fn outcome(&self, entity: Option<&Project>, changed: bool) -> Outcome {
        Outcome::new(changed)
            .with("id", entity.map(|p| &p.uuid))
            .with("project", entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Reconciler;
    use crate::resources::test_support::v2_client;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LIST: &str = "/metalstack.api.v2.ProjectService/List";

    fn params(value: serde_json::Value) -> ProjectV2Params {
        serde_json::from_value(value).unwrap()
    }

    fn managed(uuid: &str, name: &str) -> serde_json::Value {
        json!({
            "uuid": uuid,
            "name": name,
            "tenant": "acme",
            "meta": { "labels": { "labels": { "ci.metal-stack.io/manager": "ansible" } } }
        })
    }

    #[test]
    fn test_tenant_is_required() {
        assert!(serde_json::from_value::<ProjectV2Params>(json!({ "name": "dev" })).is_err());
    }

    #[tokio::test]
    async fn test_project_is_addressed_by_name_in_tenant() {
        let server = MockServer::start().await;
        let client = v2_client(&server);
        let resource =
            ProjectV2Resource::new(&client, params(json!({ "name": "dev", "tenant": "acme" })));

        assert_eq!(
            resource.identity().unwrap(),
            Identity::NaturalKey(NaturalKey::new("dev").scoped("tenant", "acme"))
        );
    }

    #[tokio::test]
    async fn test_create_project_in_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LIST))
            .and(body_json(json!({ "name": "dev", "tenant": "acme" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "projects": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/metalstack.api.v2.ProjectService/Create"))
            .and(body_json(json!({
                "login": "acme",
                "name": "dev",
                "description": "development",
                "labels": { "labels": { "ci.metal-stack.io/manager": "ansible" } }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "project": managed("p-1", "dev") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = v2_client(&server);
        let resource = ProjectV2Resource::new(
            &client,
            params(json!({ "name": "dev", "tenant": "acme", "description": "development" })),
        );

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.get("id"), Some(&json!("p-1")));
        assert_eq!(outcome.get("project").unwrap()["tenant"], json!("acme"));
    }

    #[tokio::test]
    async fn test_existing_project_is_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LIST))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [managed("p-1", "dev"), managed("p-2", "dev-old")]
            })))
            .mount(&server)
            .await;

        let client = v2_client(&server);
        let resource =
            ProjectV2Resource::new(&client, params(json!({ "name": "dev", "tenant": "acme" })));

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.get("id"), Some(&json!("p-1")));
    }

    #[tokio::test]
    async fn test_delete_project() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LIST))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [managed("p-1", "dev")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/metalstack.api.v2.ProjectService/Delete"))
            .and(body_json(json!({ "project": "p-1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "project": managed("p-1", "dev") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = v2_client(&server);
        let resource =
            ProjectV2Resource::new(&client, params(json!({ "name": "dev", "tenant": "acme" })));

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap();
        assert!(outcome.changed);
    }
}
