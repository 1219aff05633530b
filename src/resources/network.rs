//! Child network module.
//!
//! Networks are identified by id, or by name within a partition and project.
//! Labels can only be set on allocation; the remote does not update them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiParams;
use crate::error::{ReconcileError, Result};
use crate::metal::{
    MetalClient, Network, NetworkAllocateRequest, NetworkFindRequest, NetworkUpdateRequest,
};
use crate::reconciler::ownership::{has_label, with_label};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// Parameters of the network module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiParams,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Network id.
    #[serde(default)]
    pub id: Option<String>,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Partition.
    #[serde(default)]
    pub partition: Option<String>,
    /// Project.
    #[serde(default)]
    pub project: Option<String>,
    /// Labels applied on allocation.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Network adapter.
pub struct NetworkResource<'a> {
    client: &'a MetalClient,
    params: NetworkParams,
}

impl<'a> NetworkResource<'a> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(client: &'a MetalClient, params: NetworkParams) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl Resource for NetworkResource<'_> {
    type Entity = Network;
    type Patch = NetworkUpdateRequest;

    fn kind(&self) -> &'static str {
        "network"
    }

    fn identity(&self) -> Result<Identity> {
        Identity::from_parts(
            self.params.id.as_deref(),
            self.params.name.as_deref(),
            &[
                ("partition", self.params.partition.as_deref()),
                ("project", self.params.project.as_deref()),
            ],
            "either id or partition, project and name must be given",
        )
    }

    fn entity_id(&self, entity: &Network) -> String {
        entity.id.clone()
    }

    async fn find(&self, id: &str) -> Result<Option<Network>> {
        self.client.find_network(id).await
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<Network>> {
        let query = NetworkFindRequest {
            name: Some(key.key.clone()),
            partition_id: key.scope_value("partition").map(String::from),
            project_id: key.scope_value("project").map(String::from),
        };
        self.client.find_networks(&query).await
    }

    fn ownership(&self, entity: &Network) -> Ownership {
        Ownership::from_marker(has_label(&entity.labels))
    }

    fn diff(&self, entity: &Network) -> Result<Diff<NetworkUpdateRequest>> {
        let mut diff = DiffBuilder::new();
        let mut patch = NetworkUpdateRequest {
            id: entity.id.clone(),
            ..NetworkUpdateRequest::default()
        };

        if diff.compare(
            "description",
            entity.description.as_deref(),
            self.params.description.as_deref(),
        ) {
            patch.description.clone_from(&self.params.description);
        }

        // A name only differs when the network was addressed by id.
        if self.params.id.is_some()
            && diff.compare("name", entity.name.as_deref(), self.params.name.as_deref())
        {
            patch.name.clone_from(&self.params.name);
        }

        Ok(diff.finish(patch))
    }

    async fn create(&self) -> Result<Network> {
        let (Some(name), Some(partition), Some(project)) = (
            &self.params.name,
            &self.params.partition,
            &self.params.project,
        ) else {
            return Err(ReconcileError::invalid_arguments(
                "partition, project and name are required to allocate a network",
            )
            .into());
        };

        let request = NetworkAllocateRequest {
            name: name.clone(),
            description: self.params.description.clone(),
            partition_id: partition.clone(),
            project_id: project.clone(),
            labels: with_label(&self.params.labels),
        };
        self.client.allocate_network(&request).await
    }

    async fn update(&self, _entity: &Network, patch: NetworkUpdateRequest) -> Result<Network> {
        self.client.update_network(&patch).await
    }

    async fn delete(&self, entity: &Network) -> Result<Option<Network>> {
        self.client.free_network(&entity.id).await.map(Some)
    }

    fn outcome(&self, entity: Option<&Network>, changed: bool) -> Outcome {
        Outcome::new(changed)
            .with("id", entity.map(|n| &n.id))
            .with("prefixes", entity.map(|n| &n.prefixes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Reconciler;
    use crate::resources::test_support::{OWN, metal_client};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(value: serde_json::Value) -> NetworkParams {
        serde_json::from_value(value).unwrap()
    }

    fn managed_labels() -> serde_json::Value {
        json!({ "ci.metal-stack.io/manager": "ansible" })
    }

    #[tokio::test]
    async fn test_present_existing_network_without_changes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/network/find"))
            .and(body_json(json!({ "name": "test", "partitionid": "fra-equ01", "projectid": "p1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "n1", "name": "test", "partitionid": "fra-equ01", "projectid": "p1",
                "prefixes": ["10.0.0.0/22"], "labels": managed_labels()
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = NetworkResource::new(
            &client,
            params(json!({ "name": "test", "partition": "fra-equ01", "project": "p1" })),
        );

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert_eq!(
            outcome.to_json(),
            json!({ "changed": false, "id": "n1", "prefixes": ["10.0.0.0/22"] })
        );
    }

    #[tokio::test]
    async fn test_description_update_is_partial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "n1", "name": "test", "description": "old",
                "prefixes": ["10.0.0.0/22"], "labels": managed_labels()
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/network"))
            .and(body_json(json!({ "id": "n1", "description": "new" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "n1", "name": "test", "description": "new",
                "prefixes": ["10.0.0.0/22"], "labels": managed_labels()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource =
            NetworkResource::new(&client, params(json!({ "id": "n1", "description": "new" })));

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn test_ambiguous_network_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/network/find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "n1", "name": "test", "labels": managed_labels() },
                { "id": "n2", "name": "test", "labels": managed_labels() }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = NetworkResource::new(
            &client,
            params(json!({ "name": "test", "partition": "fra-equ01", "project": "p1", "state": "absent" })),
        );

        let err = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "AmbiguousMatch");
    }

    #[tokio::test]
    async fn test_missing_scope_is_rejected() {
        let server = MockServer::start().await;
        let client = metal_client(&server);
        let resource =
            NetworkResource::new(&client, params(json!({ "name": "test", "project": "p1" })));

        let err = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "either id or partition, project and name must be given"
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_network_is_not_freed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "n1", "name": "shared", "labels": { "owner": "someone-else" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = NetworkResource::new(&client, params(json!({ "id": "n1" })));

        let err = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotManaged");
        assert!(err.to_string().contains(OWN));
    }
}
