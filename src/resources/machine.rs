//! Machine allocation module.
//!
//! A machine counts as present once it is allocated. Allocations are found by
//! machine id or by allocation name within the project. Only description and
//! tags of an existing allocation can be changed; everything else is fixed at
//! allocation time.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiParams;
use crate::error::{ReconcileError, Result};
use crate::metal::{
    Machine, MachineAllocateRequest, MachineAllocationNetwork, MachineFindRequest,
    MachineUpdateRequest, MetalClient,
};
use crate::reconciler::ownership::{has_tag, with_tag};
use crate::reconciler::{
    Diff, DiffBuilder, Identity, NaturalKey, Outcome, Ownership, Resource, TargetState,
};

/// Parameters of the machine module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MachineParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiParams,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Machine id; allocates this specific machine when free.
    #[serde(default)]
    pub id: Option<String>,
    /// Allocation name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Project.
    #[serde(default)]
    pub project: Option<String>,
    /// Partition.
    #[serde(default)]
    pub partition: Option<String>,
    /// Image.
    #[serde(default)]
    pub image: Option<String>,
    /// Size.
    #[serde(default)]
    pub size: Option<String>,
    /// Networks as `id`, `id:auto` or `id:noauto`.
    #[serde(default)]
    pub networks: Vec<String>,
    /// Additional addresses.
    #[serde(default)]
    pub ips: Vec<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Authorized SSH keys.
    #[serde(default)]
    pub ssh_pub_keys: Vec<String>,
    /// Cloud-init user data.
    #[serde(default)]
    pub userdata: Option<String>,
}

/// Whether an allocation is a plain machine or a firewall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationRole {
    /// Machine.
    Machine,
    /// Firewall.
    Firewall,
}

/// Parses network entries of the form `id[:auto|:noauto]`.
///
/// # Errors
///
/// Returns `InvalidArguments` for any other acquisition mode.
pub fn parse_networks(entries: &[String]) -> Result<Vec<MachineAllocationNetwork>> {
    entries
        .iter()
        .map(|entry| {
            let (id, autoacquire) = match entry.split_once(':') {
                None => (entry.as_str(), true),
                Some((id, "auto")) => (id, true),
                Some((id, "noauto")) => (id, false),
                Some((_, mode)) => {
                    return Err(ReconcileError::invalid_arguments(format!(
                        "network acquisition mode not supported: {mode}"
                    ))
                    .into());
                }
            };
            Ok(MachineAllocationNetwork {
                network_id: id.to_string(),
                autoacquire,
            })
        })
        .collect()
}

/// Machine and firewall adapter.
pub struct MachineResource<'a> {
    client: &'a MetalClient,
    params: MachineParams,
    role: AllocationRole,
}

impl<'a> MachineResource<'a> {
    /// Creates the adapter for machines.
    #[must_use]
    pub const fn new(client: &'a MetalClient, params: MachineParams) -> Self {
        Self::with_role(client, params, AllocationRole::Machine)
    }

    /// Creates the adapter for the given allocation role.
    #[must_use]
    pub const fn with_role(
        client: &'a MetalClient,
        params: MachineParams,
        role: AllocationRole,
    ) -> Self {
        Self {
            client,
            params,
            role,
        }
    }

    fn allocate_request(&self) -> Result<MachineAllocateRequest> {
        let Some(project) = &self.params.project else {
            return Err(ReconcileError::invalid_arguments("project is required to allocate").into());
        };

        Ok(MachineAllocateRequest {
            uuid: self.params.id.clone(),
            name: self.params.name.clone(),
            description: self.params.description.clone(),
            hostname: self.params.hostname.clone(),
            partition_id: self.params.partition.clone(),
            project_id: project.clone(),
            image_id: self.params.image.clone(),
            size_id: self.params.size.clone(),
            networks: parse_networks(&self.params.networks)?,
            ips: self.params.ips.clone(),
            tags: with_tag(self.params.tags.as_deref().unwrap_or_default()),
            ssh_pub_keys: self.params.ssh_pub_keys.clone(),
            user_data: self.params.userdata.clone(),
        })
    }
}

#[async_trait]
impl Resource for MachineResource<'_> {
    type Entity = Machine;
    type Patch = MachineUpdateRequest;

    fn kind(&self) -> &'static str {
        match self.role {
            AllocationRole::Machine => "machine",
            AllocationRole::Firewall => "firewall",
        }
    }

    fn identity(&self) -> Result<Identity> {
        Identity::from_parts(
            self.params.id.as_deref(),
            self.params.name.as_deref(),
            &[("project", self.params.project.as_deref())],
            "either id or name and project must be given",
        )
    }

    fn validate(&self) -> Result<()> {
        parse_networks(&self.params.networks).map(|_| ())
    }

    fn entity_id(&self, entity: &Machine) -> String {
        entity.id.clone()
    }

    async fn find(&self, id: &str) -> Result<Option<Machine>> {
        let machine = match self.role {
            AllocationRole::Machine => self.client.find_machine(id).await?,
            AllocationRole::Firewall => self.client.find_firewall(id).await?,
        };
        Ok(machine.filter(|m| m.allocation.is_some()))
    }

    async fn search(&self, key: &NaturalKey) -> Result<Vec<Machine>> {
        let query = MachineFindRequest {
            allocation_name: Some(key.key.clone()),
            allocation_project: key.scope_value("project").map(String::from),
        };
        match self.role {
            AllocationRole::Machine => self.client.find_machines(&query).await,
            AllocationRole::Firewall => self.client.find_firewalls(&query).await,
        }
    }

    fn ownership(&self, entity: &Machine) -> Ownership {
        Ownership::from_marker(has_tag(&entity.tags))
    }

    fn diff(&self, entity: &Machine) -> Result<Diff<MachineUpdateRequest>> {
        let mut diff = DiffBuilder::new();
        let mut patch = MachineUpdateRequest {
            id: entity.id.clone(),
            ..MachineUpdateRequest::default()
        };

        let current_description = entity
            .allocation
            .as_ref()
            .and_then(|a| a.description.as_deref());
        if diff.compare(
            "description",
            current_description,
            self.params.description.as_deref(),
        ) {
            patch.description.clone_from(&self.params.description);
        }
        if let Some(tags) = &self.params.tags {
            let desired = with_tag(tags);
            if diff.compare_set("tags", &entity.tags, &desired) {
                patch.tags = Some(desired);
            }
        }

        Ok(diff.finish(patch))
    }

    async fn create(&self) -> Result<Machine> {
        let request = self.allocate_request()?;
        match self.role {
            AllocationRole::Machine => self.client.allocate_machine(&request).await,
            AllocationRole::Firewall => self.client.allocate_firewall(&request).await,
        }
    }

    async fn update(&self, _entity: &Machine, patch: MachineUpdateRequest) -> Result<Machine> {
        self.client.update_machine(&patch).await
    }

    async fn delete(&self, entity: &Machine) -> Result<Option<Machine>> {
        self.client.free_machine(&entity.id).await.map(Some)
    }

    fn outcome(&self, entity: Option<&Machine>, changed: bool) -> Outcome {
        Outcome::new(changed).with("id", entity.map(|m| &m.id))
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

    fn params(value: serde_json::Value) -> MachineParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_networks() {
        let networks = parse_networks(&[
            String::from("internet"),
            String::from("private:auto"),
            String::from("storage:noauto"),
        ])
        .unwrap();

        assert_eq!(
            networks
                .iter()
                .map(|n| (n.network_id.as_str(), n.autoacquire))
                .collect::<Vec<_>>(),
            vec![("internet", true), ("private", true), ("storage", false)]
        );

        let err = parse_networks(&[String::from("internet:sometimes")]).unwrap_err();
        assert_eq!(err.to_string(), "network acquisition mode not supported: sometimes");
    }

    #[tokio::test]
    async fn test_allocate_machine() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/machine/find"))
            .and(body_json(json!({ "allocation_name": "web-1", "allocation_project": "p1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/machine/allocate"))
            .and(body_json(json!({
                "name": "web-1",
                "hostname": "web-1",
                "partitionid": "fra-equ01",
                "projectid": "p1",
                "imageid": "ubuntu-24.04",
                "sizeid": "c1-xlarge-x86",
                "networks": [
                    { "networkid": "internet", "autoacquire": true },
                    { "networkid": "private", "autoacquire": false }
                ],
                "ips": [],
                "tags": ["role=web", OWN],
                "ssh_pub_keys": ["ssh-ed25519 AAAA"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m-1", "tags": ["role=web", OWN], "allocation": { "name": "web-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = MachineResource::new(
            &client,
            params(json!({
                "name": "web-1",
                "hostname": "web-1",
                "project": "p1",
                "partition": "fra-equ01",
                "image": "ubuntu-24.04",
                "size": "c1-xlarge-x86",
                "networks": ["internet", "private:noauto"],
                "tags": ["role=web"],
                "ssh_pub_keys": ["ssh-ed25519 AAAA"]
            })),
        );

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap();
        assert_eq!(outcome.to_json(), json!({ "changed": true, "id": "m-1" }));
    }

    #[tokio::test]
    async fn test_free_machine_is_not_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/machine/m-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m-1" })))
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = MachineResource::new(&client, params(json!({ "id": "m-1" })));

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap();
        assert!(!outcome.changed);
    }

    #[tokio::test]
    async fn test_free_allocated_machine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/machine/m-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m-1", "tags": [OWN], "allocation": { "name": "web-1", "project": "p1" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/machine/m-1/free"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = metal_client(&server);
        let resource = MachineResource::new(&client, params(json!({ "id": "m-1", "project": "p1" })));

        let outcome = Reconciler::new(&resource)
            .reconcile(TargetState::Absent)
            .await
            .unwrap();
        assert_eq!(outcome.to_json(), json!({ "changed": true, "id": "m-1" }));
    }

    #[tokio::test]
    async fn test_unsupported_network_mode_fails_before_remote_calls() {
        let server = MockServer::start().await;
        let client = metal_client(&server);
        let resource = MachineResource::new(
            &client,
            params(json!({ "name": "web-1", "project": "p1", "networks": ["internet:maybe"] })),
        );

        let err = Reconciler::new(&resource)
            .reconcile(TargetState::Present)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidArguments");
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
