//! Dynamic inventory of managed machines.
//!
//! Lists allocated machines carrying the ownership tag and groups them the
//! way playbooks address them: by project, size, partition, image and rack
//! for machines, and under `metal-firewalls` for everything else.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::config::InventoryConfig;
use crate::error::{MetalError, Result};
use crate::metal::{Machine, MachineNetwork, MetalClient, Project};
use crate::reconciler::ownership::has_tag;

/// Group of all regular machines.
pub const MACHINE_GROUP: &str = "metal";

/// Group of everything not booted from a machine image.
pub const FIREWALL_GROUP: &str = "metal-firewalls";

/// Entry of a machine's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogEntry {
    /// Event type.
    pub event: String,
    /// Event message.
    pub message: Option<String>,
    /// Event time.
    pub time: Option<String>,
}

/// Variables of one host. Fields are declared in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostVars {
    /// Address Ansible connects to.
    pub ansible_host: String,
    /// Remote user.
    pub ansible_user: String,
    /// Allocation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_allocated_at: Option<String>,
    /// Whether the allocation finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_allocation_succeeded: Option<bool>,
    /// Console password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_console_password: Option<String>,
    /// Allocating user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_creator: Option<String>,
    /// Allocation description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_description: Option<String>,
    /// Event log.
    pub metal_event_log: Vec<EventLogEntry>,
    /// Hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_hostname: Option<String>,
    /// Machine id.
    pub metal_id: String,
    /// Image id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_image: Option<String>,
    /// Image expiration date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_image_expiration: Option<String>,
    /// First address on a private network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_internal_ip: Option<String>,
    /// Firewall image with more than one network.
    pub metal_is_firewall: bool,
    /// Machine image.
    pub metal_is_machine: bool,
    /// Allocation name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_name: Option<String>,
    /// Partition id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_partition: Option<String>,
    /// Project id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_project: Option<String>,
    /// Rack id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_rack_id: Option<String>,
    /// Size id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_size: Option<String>,
    /// Machine tags.
    pub metal_tags: Vec<String>,
    /// Tenant owning the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_tenant: Option<String>,
}

/// Inventory in Ansible's dynamic inventory layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Host variables by host name.
    pub hostvars: BTreeMap<String, HostVars>,
    /// Host names by group.
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Inventory {
    /// Builds the inventory from machines and projects.
    #[must_use]
    pub fn build(config: &InventoryConfig, machines: &[Machine], projects: &[Project]) -> Self {
        let tenants: BTreeMap<&str, &str> = projects
            .iter()
            .filter_map(|p| Some((p.meta.id.as_deref()?, p.tenant_id.as_deref()?)))
            .collect();

        let mut inventory = Self::default();
        for machine in machines {
            if !has_tag(&machine.tags) || machine.id.is_empty() {
                continue;
            }
            let Some(allocation) = &machine.allocation else {
                continue;
            };

            let name = non_empty(allocation.name.as_deref());
            let hostname = non_empty(allocation.hostname.as_deref());
            let Some(host) = hostname.or(name) else {
                debug!("Skipping machine {} without hostname or name", machine.id);
                continue;
            };

            let networks = &allocation.networks;
            let external_ip = first_ip(networks, |n| {
                n.network_id.contains(&config.external_network_id)
            });
            let mut ansible_host = external_ip.unwrap_or(host).to_string();
            if let Some(mapped) = config.static_machine_ip_mapping.get(host) {
                ansible_host.clone_from(mapped);
            }

            let image = allocation.image.as_ref();
            let has_feature =
                |feature: &str| image.is_some_and(|i| i.features.iter().any(|f| f == feature));
            let is_firewall = has_feature("firewall") && networks.len() > 1;
            let is_machine = has_feature("machine");

            let project = allocation.project.clone();
            let size = machine.size.as_ref().map(|s| s.id.clone());
            let partition = machine.partition.as_ref().map(|p| p.id.clone());
            let image_id = image.map(|i| i.id.clone());

            let vars = HostVars {
                ansible_host,
                ansible_user: String::from("metal"),
                metal_allocated_at: allocation.created.clone(),
                metal_allocation_succeeded: allocation.succeeded,
                metal_console_password: allocation.console_password.clone(),
                metal_creator: allocation.creator.clone(),
                metal_description: allocation.description.clone(),
                metal_event_log: machine
                    .events
                    .iter()
                    .flat_map(|e| &e.log)
                    .map(|e| EventLogEntry {
                        event: e.event.clone(),
                        message: e.message.clone(),
                        time: e.time.clone(),
                    })
                    .collect(),
                metal_hostname: hostname.map(String::from),
                metal_id: machine.id.clone(),
                metal_image: image_id.clone(),
                metal_image_expiration: image.and_then(|i| i.expiration_date.clone()),
                metal_internal_ip: first_ip(networks, |n| n.private).map(String::from),
                metal_is_firewall: is_firewall,
                metal_is_machine: is_machine,
                metal_name: name.map(String::from),
                metal_partition: partition.clone(),
                metal_project: project.clone(),
                metal_rack_id: machine.rack_id.clone(),
                metal_size: size.clone(),
                metal_tags: machine.tags.clone(),
                metal_tenant: project
                    .as_deref()
                    .and_then(|p| tenants.get(p))
                    .map(|t| (*t).to_string()),
            };

            if is_machine {
                for group in [
                    project,
                    size,
                    partition,
                    image_id,
                    machine.rack_id.clone(),
                    Some(String::from(MACHINE_GROUP)),
                ]
                .into_iter()
                .flatten()
                {
                    inventory.add_to_group(group, host);
                }
            } else {
                inventory.add_to_group(String::from(FIREWALL_GROUP), host);
            }

            inventory.hostvars.insert(host.to_string(), vars);
        }

        inventory
    }

    fn add_to_group(&mut self, group: String, host: &str) {
        if group.is_empty() {
            return;
        }
        self.groups.entry(group).or_default().push(host.to_string());
    }

    /// Inventory as JSON value: `{"_meta": {"hostvars": ...}, <group>: [hosts]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Value> {
        let mut root: BTreeMap<String, Value> = self
            .groups
            .iter()
            .map(|(group, hosts)| (group.clone(), Value::from(hosts.clone())))
            .collect();
        root.insert(
            String::from("_meta"),
            serde_json::json!({ "hostvars": serde_json::to_value(&self.hostvars)? }),
        );
        Ok(serde_json::to_value(root)?)
    }

    /// Renders the inventory with sorted keys and four-space indentation.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String> {
        render_pretty(&self.to_json()?)
    }
}

/// Fetches machines and projects and builds the inventory.
///
/// # Errors
///
/// Returns an error if a remote call fails.
pub async fn fetch(client: &MetalClient, config: &InventoryConfig) -> Result<Inventory> {
    let machines = client.find_machines(&config.scope_query()).await?;
    let projects = client.list_projects().await?;
    info!(
        "Building inventory from {} machines and {} projects",
        machines.len(),
        projects.len()
    );
    Ok(Inventory::build(config, &machines, &projects))
}

/// Host variables for `--host`. Everything is delivered through `_meta`.
#[must_use]
pub fn host_vars(_host: &str) -> Value {
    Value::Object(serde_json::Map::new())
}

/// Serializes a value with four-space indentation.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_pretty(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| MetalError::Internal(e.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn first_ip(networks: &[MachineNetwork], pred: impl Fn(&MachineNetwork) -> bool) -> Option<&str> {
    networks
        .iter()
        .filter(|n| pred(n))
        .find_map(|n| n.ips.first())
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWN: &str = "ci.metal-stack.io/manager=ansible";

    fn machine(value: Value) -> Machine {
        serde_json::from_value(value).unwrap()
    }

    fn project(id: &str, tenant: &str) -> Project {
        serde_json::from_value(json!({ "meta": { "id": id }, "tenant_id": tenant })).unwrap()
    }

    fn web_machine() -> Machine {
        machine(json!({
            "id": "m-1",
            "rackid": "rack-1",
            "size": { "id": "c1-xlarge-x86" },
            "partition": { "id": "fra-equ01" },
            "tags": [OWN],
            "allocation": {
                "name": "web",
                "hostname": "web-1",
                "project": "p-1",
                "created": "2025-01-01T10:00:00Z",
                "succeeded": true,
                "image": { "id": "ubuntu-24.04", "features": ["machine"] },
                "networks": [
                    { "networkid": "tenant-net", "private": true, "ips": ["10.0.0.1"] },
                    { "networkid": "internet-fra", "ips": ["212.34.89.1"] }
                ]
            },
            "events": { "log": [{ "event": "Phoned Home", "time": "2025-01-01T10:05:00Z" }] }
        }))
    }

    fn firewall() -> Machine {
        machine(json!({
            "id": "fw-1",
            "tags": [OWN],
            "allocation": {
                "name": "fw",
                "hostname": "fw-1",
                "project": "p-1",
                "image": { "id": "firewall-ubuntu-3.0", "features": ["firewall"] },
                "networks": [
                    { "networkid": "tenant-net", "private": true, "ips": ["10.0.0.254"] },
                    { "networkid": "internet", "ips": [] }
                ]
            }
        }))
    }

    #[test]
    fn test_machine_groups_and_hostvars() {
        let inventory = Inventory::build(
            &InventoryConfig::default(),
            &[web_machine(), firewall()],
            &[project("p-1", "acme")],
        );

        assert_eq!(
            inventory.groups.keys().collect::<Vec<_>>(),
            vec![
                "c1-xlarge-x86",
                "fra-equ01",
                "metal",
                "metal-firewalls",
                "p-1",
                "rack-1",
                "ubuntu-24.04"
            ]
        );
        assert_eq!(inventory.groups["metal-firewalls"], vec!["fw-1"]);

        let web = &inventory.hostvars["web-1"];
        assert_eq!(web.ansible_host, "212.34.89.1");
        assert_eq!(web.metal_internal_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(web.metal_tenant.as_deref(), Some("acme"));
        assert!(web.metal_is_machine);
        assert!(!web.metal_is_firewall);

        let fw = &inventory.hostvars["fw-1"];
        assert_eq!(fw.ansible_host, "fw-1");
        assert!(fw.metal_is_firewall);
    }

    #[test]
    fn test_unmanaged_and_unallocated_machines_are_skipped() {
        let unmanaged = machine(json!({
            "id": "m-2", "tags": [], "allocation": { "hostname": "other" }
        }));
        let free = machine(json!({ "id": "m-3", "tags": [OWN] }));

        let inventory = Inventory::build(&InventoryConfig::default(), &[unmanaged, free], &[]);
        assert!(inventory.hostvars.is_empty());
        assert!(inventory.groups.is_empty());
    }

    #[test]
    fn test_static_ip_mapping_overrides_ansible_host() {
        let mut config = InventoryConfig::default();
        config
            .static_machine_ip_mapping
            .insert(String::from("web-1"), String::from("192.168.1.10"));

        let inventory = Inventory::build(&config, &[web_machine()], &[]);
        assert_eq!(inventory.hostvars["web-1"].ansible_host, "192.168.1.10");
        assert_eq!(inventory.hostvars["web-1"].metal_tenant, None);
    }

    #[test]
    fn test_render_layout() {
        let inventory = Inventory::build(&InventoryConfig::default(), &[firewall()], &[]);
        let rendered = inventory.render().unwrap();

        assert!(rendered.starts_with("{\n    \"_meta\": {\n        \"hostvars\": {"));
        assert!(rendered.contains("\"metal-firewalls\": [\n        \"fw-1\"\n    ]"));
        assert!(!rendered.contains("metal_rack_id"));
    }

    #[test]
    fn test_host_vars_are_empty() {
        assert_eq!(host_vars("web-1"), json!({}));
    }
}
