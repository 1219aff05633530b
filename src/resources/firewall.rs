//! Firewall allocation module.
//!
//! Firewalls are machines allocated through the firewall endpoint and released
//! through the machine endpoint. Name and project are mandatory, and every
//! network acquires an address automatically unless marked `:noauto`.

use serde::Deserialize;

use crate::config::ApiParams;
use crate::metal::MetalClient;
use crate::reconciler::TargetState;

use super::machine::{AllocationRole, MachineParams, MachineResource};

/// Parameters of the firewall module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirewallParams {
    /// Connection settings.
    #[serde(flatten)]
    pub api: ApiParams,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Firewall id.
    #[serde(default)]
    pub id: Option<String>,
    /// Allocation name.
    pub name: String,
    /// Project.
    pub project: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Partition.
    #[serde(default)]
    pub partition: Option<String>,
    /// Image.
    #[serde(default)]
    pub image: Option<String>,
    /// Size.
    #[serde(default)]
    pub size: Option<String>,
    /// Networks.
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

impl From<FirewallParams> for MachineParams {
    fn from(p: FirewallParams) -> Self {
        Self {
            api: p.api,
            state: p.state,
            id: p.id,
            name: Some(p.name),
            description: p.description,
            hostname: p.hostname,
            project: Some(p.project),
            partition: p.partition,
            image: p.image,
            size: p.size,
            networks: p.networks,
            ips: p.ips,
            tags: p.tags,
            ssh_pub_keys: p.ssh_pub_keys,
            userdata: p.userdata,
        }
    }
}

/// Firewall adapter constructor.
pub struct FirewallResource;

impl FirewallResource {
    /// Creates the machine adapter in firewall role.
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new(client: &MetalClient, params: FirewallParams) -> MachineResource<'_> {
        MachineResource::with_role(client, params.into(), AllocationRole::Firewall)
    }
}
