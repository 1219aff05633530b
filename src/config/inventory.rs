//! Dynamic inventory configuration.
//!
//! The inventory reads an optional YAML file and falls back to environment
//! variables for connection settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::auth::{ApiConfig, ApiParams};

/// Environment variable pointing to the inventory configuration file.
pub const CONFIG_ENV: &str = "METAL_ANSIBLE_INVENTORY_CONFIG";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "metal_config.yaml";

/// A filter passed to the machine search, e.g. `{name: partition_id, value: fra-equ01}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScopeFilter {
    /// Search field.
    pub name: String,
    /// Search value.
    pub value: Value,
}

/// Inventory configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InventoryConfig {
    /// metal-api URL.
    #[serde(default)]
    pub url: Option<String>,
    /// API token.
    #[serde(default)]
    pub token: Option<String>,
    /// HMAC secret.
    #[serde(default)]
    pub hmac: Option<String>,
    /// HMAC user.
    #[serde(default)]
    pub hmac_user: Option<String>,
    /// Substring identifying the external network.
    #[serde(default = "default_external_network_id")]
    pub external_network_id: String,
    /// Filters restricting which machines are listed.
    #[serde(default)]
    pub scope_filters: Vec<ScopeFilter>,
    /// Host name to address overrides for `ansible_host`.
    #[serde(default)]
    pub static_machine_ip_mapping: BTreeMap<String, String>,
}

fn default_external_network_id() -> String {
    String::from("internet")
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            hmac: None,
            hmac_user: None,
            external_network_id: default_external_network_id(),
            scope_filters: Vec::new(),
            static_machine_ip_mapping: BTreeMap::new(),
        }
    }
}

impl InventoryConfig {
    /// Loads the configuration from `path`, or from the default location.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(find_config_file);

        let Some(path) = path.filter(|p| p.is_file()) else {
            debug!("No inventory configuration file found, using environment only");
            return Ok(Self::default());
        };

        info!("Loading inventory configuration from: {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        Self::parse_yaml(&content)
    }

    /// Parses the configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::parse("inventory configuration", e.to_string()).into())
    }

    /// Resolves connection settings against the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or every credential is missing.
    pub fn api_config(&self) -> Result<ApiConfig> {
        self.api_config_with(|name| std::env::var(name).ok())
    }

    /// Resolves connection settings with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or every credential is missing.
    pub fn api_config_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ApiConfig> {
        let params = ApiParams {
            api_url: self
                .url
                .clone()
                .or_else(|| env("METAL_ANSIBLE_INVENTORY_URL")),
            api_hmac: self
                .hmac
                .clone()
                .or_else(|| env("METAL_ANSIBLE_INVENTORY_HMAC")),
            api_hmac_user: self.hmac_user.clone(),
            api_token: self
                .token
                .clone()
                .or_else(|| env("METAL_ANSIBLE_INVENTORY_TOKEN")),
            api_timeout: None,
        };
        params.resolve_with(env)
    }

    /// Machine search body built from the scope filters.
    #[must_use]
    pub fn scope_query(&self) -> Map<String, Value> {
        self.scope_filters
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }
}

/// Finds the configuration file: the environment variable, a file next to the
/// binary, then the user configuration directory.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    let beside_binary = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)));
    let in_config_dir =
        dirs::config_dir().map(|dir| dir.join("metal-ansible").join(DEFAULT_CONFIG_FILE));

    [beside_binary, in_config_dir]
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
url: https://api.metal-stack.io/metal
hmac: secret
external_network_id: mgmt
scope_filters:
  - name: partition_id
    value: fra-equ01
  - name: allocation_project
    value: 9a8b7c
static_machine_ip_mapping:
  fw-1: 10.1.1.1
";
        let config = InventoryConfig::parse_yaml(yaml).unwrap();
        assert_eq!(config.external_network_id, "mgmt");
        assert_eq!(config.scope_query()["partition_id"], "fra-equ01");
        assert_eq!(config.static_machine_ip_mapping["fw-1"], "10.1.1.1");

        let api = config.api_config_with(|_| None).unwrap();
        assert_eq!(api.url, "https://api.metal-stack.io/metal");
        assert!(matches!(api.credentials, Credentials::Hmac { ref user, .. } if user == "Metal-Edit"));
    }

    #[test]
    fn test_empty_config_uses_env() {
        let config = InventoryConfig::parse_yaml("").unwrap();
        assert_eq!(config.external_network_id, "internet");

        let api = config
            .api_config_with(|name| match name {
                "METALCTL_URL" => Some(String::from("http://metal")),
                "METAL_ANSIBLE_INVENTORY_TOKEN" => Some(String::from("tok")),
                _ => None,
            })
            .unwrap();
        assert_eq!(api.url, "http://metal");
        assert_eq!(api.credentials, Credentials::Token(String::from("tok")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "url: http://localhost:8080\ntoken: abc\n").unwrap();

        let config = InventoryConfig::load(Some(&path)).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://localhost:8080"));

        let missing = InventoryConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap();
        assert_eq!(missing, InventoryConfig::default());
    }
}
