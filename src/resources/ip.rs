//! IP address module.
//!
//! Addresses are identified by the address itself, or by name within a
//! project and network. Giving an address that does not exist yet allocates
//! exactly that address.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiParams;
use crate::error::{ReconcileError, Result};
use crate::metal::{Ip, IpAllocateRequest, IpFindRequest, IpType, IpUpdateRequest, MetalClient};
use crate::reconciler::ownership::{has_tag, with_tag};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// Parameters of the IP module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiParams,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// The address.
    #[serde(default)]
    pub ip: Option<String>,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Network to allocate from.
    #[serde(default)]
    pub network: Option<String>,
    /// Project.
    #[serde(default)]
    pub project: Option<String>,
    /// Lifetime, ephemeral when allocating without one.
    #[serde(default, rename = "type")]
    pub ip_type: Option<IpType>,
    /// Tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// IP adapter.
pub struct IpResource<'a> {
    client: &'a MetalClient,
    params: IpParams,
}

impl<'a> IpResource<'a> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(client: &'a MetalClient, params: IpParams) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl Resource for IpResource<'_> {
    type Entity = Ip;
    type Patch = IpUpdateRequest;

    fn kind(&self) -> &'static str {
        "ip"
    }

    fn identity(&self) -> Result<Identity> {
        let message = if self.params.state == TargetState::Absent {
            "ip is a required argument when state is absent, or name, project and network must be given"
        } else {
            "either ip or name, project and network must be given"
        };
        Identity::from_parts(
            self.params.ip.as_deref(),
            self.params.name.as_deref(),
            &[
                ("project", self.params.project.as_deref()),
                ("network", self.params.network.as_deref()),
            ],
            message,
        )
    }

    fn entity_id(&self, entity: &Ip) -> String {
        entity.ip_address.clone()
    }

    async fn find(&self, id: &str) -> Result<Option<Ip>> {
        self.client.find_ip(id).await
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<Ip>> {
        let query = IpFindRequest {
            name: Some(key.key.clone()),
            project_id: key.scope_value("project").map(String::from),
            network_id: key.scope_value("network").map(String::from),
        };
        self.client.find_ips(&query).await
    }

    fn ownership(&self, entity: &Ip) -> Ownership {
        Ownership::from_marker(has_tag(&entity.tags))
    }

    fn diff(&self, entity: &Ip) -> Result<Diff<IpUpdateRequest>> {
        let mut diff = DiffBuilder::new();
        let mut patch = IpUpdateRequest {
            ip_address: entity.ip_address.clone(),
            ..IpUpdateRequest::default()
        };

        if self.params.ip.is_some()
            && diff.compare("name", entity.name.as_deref(), self.params.name.as_deref())
        {
            patch.name.clone_from(&self.params.name);
        }
        if diff.compare(
            "description",
            entity.description.as_deref(),
            self.params.description.as_deref(),
        ) {
            patch.description.clone_from(&self.params.description);
        }
        if diff.compare("type", Some(&entity.ip_type), self.params.ip_type.as_ref()) {
            patch.ip_type = self.params.ip_type;
        }
        if let Some(tags) = &self.params.tags {
            let desired = with_tag(tags);
            if diff.compare_set("tags", &entity.tags, &desired) {
                patch.tags = Some(desired);
            }
        }

        Ok(diff.finish(patch))
    }

    async fn create(&self) -> Result<Ip> {
        let (Some(network), Some(project)) = (&self.params.network, &self.params.project) else {
            return Err(ReconcileError::invalid_arguments(
                "network and project are required to allocate an ip",
            )
            .into());
        };

        let request = IpAllocateRequest {
            name: self.params.name.clone(),
            description: self.params.description.clone(),
            network_id: network.clone(),
            project_id: project.clone(),
            ip_type: self.params.ip_type.unwrap_or_default(),
            tags: with_tag(self.params.tags.as_deref().unwrap_or_default()),
        };
        self.client
            .allocate_ip(&request, self.params.ip.as_deref())
            .await
    }

    async fn update(&self, _entity: &Ip, patch: IpUpdateRequest) -> Result<Ip> {
        self.client.update_ip(&patch).await
    }

    async fn delete(&self, entity: &Ip) -> Result<Option<Ip>> {
        self.client.free_ip(&entity.ip_address).await.map(Some)
    }

    fn outcome(&self, entity: Option<&Ip>, changed: bool) -> Outcome {
        Outcome::new(changed).with("ip", entity.map(|i| &i.ip_address))
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

    fn params(value: serde_json::Value) -> IpParams {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_allocate_random_ip_with_tags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ip/find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/ip/allocate"))
            .and(body_json(json!({
                "name": "test",
                "networkid": "internet",
                "projectid": "p1",
                "type": "ephemeral",
                "tags": [OWN]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ipaddress": "212.34.89.212", "name": "test", "type": "ephemeral", "tags": [OWN]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = IpResource::new(
            &client,
            params(json!({ "name": "test", "network": "internet", "project": "p1" })),
        );

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert_eq!(
            outcome.to_json(),
            json!({ "changed": true, "ip": "212.34.89.212" })
        );
    }

    #[tokio::test]
    async fn test_allocate_specific_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ip/212.34.89.212"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "not found" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/ip/allocate/212.34.89.212"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ipaddress": "212.34.89.212", "type": "static", "tags": [OWN]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = IpResource::new(
            &client,
            params(json!({
                "ip": "212.34.89.212", "network": "internet", "project": "p1", "type": "static"
            })),
        );

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn test_tags_are_updated_with_ownership_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ip/212.34.89.212"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ipaddress": "212.34.89.212", "type": "ephemeral", "tags": [OWN]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/ip"))
            .and(body_json(json!({
                "ipaddress": "212.34.89.212",
                "tags": ["a-new-tag", OWN]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ipaddress": "212.34.89.212", "type": "ephemeral", "tags": ["a-new-tag", OWN]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = IpResource::new(
            &client,
            params(json!({ "ip": "212.34.89.212", "type": "ephemeral", "tags": ["a-new-tag"] })),
        );

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn test_absent_requires_an_identity() {
        let server = MockServer::start().await;
        let client = metal_client(&server);
        let resource = IpResource::new(&client, params(json!({ "state": "absent" })));

        let err = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("ip is a required argument when state is absent"));
    }

    #[tokio::test]
    async fn test_untagged_ip_is_not_freed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ip/212.34.89.212"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ipaddress": "212.34.89.212", "type": "static", "tags": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = IpResource::new(&client, params(json!({ "ip": "212.34.89.212" })));

        let err = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotManaged");
    }
}
