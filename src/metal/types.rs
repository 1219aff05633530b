//! metal-api v1 types and data structures.
//!
//! Field names follow the remote JSON schema; request types skip unset
//! optional fields so updates stay partial.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// Network id.
    pub id: String,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Partition the network lives in.
    #[serde(default, rename = "partitionid")]
    pub partition_id: Option<String>,
    /// Owning project.
    #[serde(default, rename = "projectid")]
    pub project_id: Option<String>,
    /// Allocated prefixes.
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Network search body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkFindRequest {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Partition.
    #[serde(rename = "partitionid", skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<String>,
    /// Project.
    #[serde(rename = "projectid", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Network allocation body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkAllocateRequest {
    /// Name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Partition.
    #[serde(rename = "partitionid")]
    pub partition_id: String,
    /// Project.
    #[serde(rename = "projectid")]
    pub project_id: String,
    /// Labels.
    pub labels: BTreeMap<String, String>,
}

/// Network update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkUpdateRequest {
    /// Network id.
    pub id: String,
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// IP address lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpType {
    /// Released together with the machine it is attached to.
    #[default]
    Ephemeral,
    /// Kept until explicitly freed.
    Static,
}

/// An IP address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ip {
    /// The address.
    #[serde(rename = "ipaddress")]
    pub ip_address: String,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Network the address was taken from.
    #[serde(default, rename = "networkid")]
    pub network_id: Option<String>,
    /// Owning project.
    #[serde(default, rename = "projectid")]
    pub project_id: Option<String>,
    /// Lifetime.
    #[serde(default, rename = "type")]
    pub ip_type: IpType,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// IP search body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IpFindRequest {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Project.
    #[serde(rename = "projectid", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Network.
    #[serde(rename = "networkid", skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
}

/// IP allocation body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpAllocateRequest {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Network.
    #[serde(rename = "networkid")]
    pub network_id: String,
    /// Project.
    #[serde(rename = "projectid")]
    pub project_id: String,
    /// Lifetime.
    #[serde(rename = "type")]
    pub ip_type: IpType,
    /// Tags.
    pub tags: Vec<String>,
}

/// IP update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IpUpdateRequest {
    /// The address.
    #[serde(rename = "ipaddress")]
    pub ip_address: String,
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifetime.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ip_type: Option<IpType>,
    /// Tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Reference to a partition, size or rack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Id.
    pub id: String,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
}

/// An OS image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Image id.
    pub id: String,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Features such as `machine` or `firewall`.
    #[serde(default)]
    pub features: Vec<String>,
    /// Expiration date.
    #[serde(default, rename = "expirationDate")]
    pub expiration_date: Option<String>,
}

/// A network attached to a machine allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineNetwork {
    /// Network id.
    #[serde(rename = "networkid")]
    pub network_id: String,
    /// Addresses on this network.
    #[serde(default)]
    pub ips: Vec<String>,
    /// Whether this is a private (project) network.
    #[serde(default)]
    pub private: bool,
    /// Whether this is an underlay network.
    #[serde(default)]
    pub underlay: bool,
}

/// Allocation of a machine to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineAllocation {
    /// Allocation name.
    #[serde(default)]
    pub name: Option<String>,
    /// Hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning project.
    #[serde(default)]
    pub project: Option<String>,
    /// User who allocated.
    #[serde(default)]
    pub creator: Option<String>,
    /// Allocation timestamp.
    #[serde(default)]
    pub created: Option<String>,
    /// Whether provisioning finished.
    #[serde(default)]
    pub succeeded: Option<bool>,
    /// Installed image.
    #[serde(default)]
    pub image: Option<Image>,
    /// Attached networks.
    #[serde(default)]
    pub networks: Vec<MachineNetwork>,
    /// Console password.
    #[serde(default)]
    pub console_password: Option<String>,
}

/// A provisioning event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    /// Event name.
    pub event: String,
    /// Message.
    #[serde(default)]
    pub message: Option<String>,
    /// Timestamp.
    #[serde(default)]
    pub time: Option<String>,
}

/// Provisioning event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineEvents {
    /// Events, newest first.
    #[serde(default)]
    pub log: Vec<MachineEvent>,
}

/// A machine or firewall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Machine id.
    pub id: String,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Partition.
    #[serde(default)]
    pub partition: Option<Reference>,
    /// Rack.
    #[serde(default, rename = "rackid")]
    pub rack_id: Option<String>,
    /// Size.
    #[serde(default)]
    pub size: Option<Reference>,
    /// Allocation, absent for free machines.
    #[serde(default)]
    pub allocation: Option<MachineAllocation>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Provisioning events.
    #[serde(default)]
    pub events: Option<MachineEvents>,
}

/// Machine and firewall search body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineFindRequest {
    /// Allocation name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_name: Option<String>,
    /// Allocation project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_project: Option<String>,
}

/// A network to attach on allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineAllocationNetwork {
    /// Network id.
    #[serde(rename = "networkid")]
    pub network_id: String,
    /// Acquire an address automatically.
    pub autoacquire: bool,
}

/// Machine and firewall allocation body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineAllocateRequest {
    /// Allocate this specific machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Partition.
    #[serde(rename = "partitionid", skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<String>,
    /// Project.
    #[serde(rename = "projectid")]
    pub project_id: String,
    /// Image.
    #[serde(rename = "imageid", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Size.
    #[serde(rename = "sizeid", skip_serializing_if = "Option::is_none")]
    pub size_id: Option<String>,
    /// Networks.
    pub networks: Vec<MachineAllocationNetwork>,
    /// Additional addresses.
    pub ips: Vec<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Authorized SSH keys.
    pub ssh_pub_keys: Vec<String>,
    /// Cloud-init user data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// Machine update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineUpdateRequest {
    /// Machine id.
    pub id: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Masterdata metadata of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Project id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Version used for optimistic locking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Labels.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Metadata.
    #[serde(default)]
    pub meta: Meta,
    /// Name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl Project {
    /// Project id, empty if the remote did not return one.
    #[must_use]
    pub fn id(&self) -> &str {
        self.meta.id.as_deref().unwrap_or_default()
    }
}

/// Project search body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectFindRequest {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Project create body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCreateRequest {
    /// Metadata carrying the ownership annotation.
    pub meta: Meta,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Project update body. The metadata echoes the version read before.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectUpdateRequest {
    /// Metadata.
    pub meta: Meta,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}
