//! Module argument files.
//!
//! Ansible hands binary modules a JSON file holding the task parameters under
//! `ANSIBLE_MODULE_ARGS`, next to control keys prefixed with `_ansible_`.
//! Plain parameter maps (JSON or YAML) are accepted as well, which keeps
//! modules usable from the command line.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, MetalError, ReconcileError, Result};

/// Key under which Ansible nests the module parameters.
const ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// Prefix of Ansible control keys.
const CONTROL_PREFIX: &str = "_ansible_";

/// Parsed module arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleArgs {
    /// Task parameters without control keys.
    params: Map<String, Value>,
    /// Whether Ansible runs in check mode.
    check_mode: bool,
}

impl ModuleArgs {
    /// Loads arguments from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading module arguments from: {}", path.display());

        if !path.exists() {
            return Err(MetalError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses arguments from JSON or YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a parameter map.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::parse("module arguments", e.to_string()))?;
        Self::from_value(value)
    }

    /// Builds arguments from an already parsed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a map.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(ConfigError::parse("module arguments", "expected a map of parameters").into());
        };

        let raw = match root.remove(ARGS_KEY) {
            Some(Value::Object(inner)) => inner,
            Some(_) => {
                return Err(
                    ConfigError::parse("module arguments", format!("{ARGS_KEY} must be a map")).into(),
                );
            }
            None => root,
        };

        let mut params = Map::new();
        let mut check_mode = false;
        for (key, value) in raw {
            if let Some(control) = key.strip_prefix(CONTROL_PREFIX) {
                if control == "check_mode" {
                    check_mode = value.as_bool().unwrap_or(false);
                }
                continue;
            }
            params.insert(key, value);
        }

        debug!("Parsed {} module parameters (check mode: {check_mode})", params.len());
        Ok(Self { params, check_mode })
    }

    /// Returns true if the module runs in check mode.
    #[must_use]
    pub const fn check_mode(&self) -> bool {
        self.check_mode
    }

    /// Returns the raw parameter map.
    #[must_use]
    pub const fn raw(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Deserializes the parameters into a module's parameter type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if a parameter has the wrong shape.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            ReconcileError::invalid_arguments(format!("invalid module arguments: {e}")).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Params {
        name: String,
        #[serde(default)]
        description: Option<String>,
    }

    #[test]
    fn test_ansible_envelope_is_unwrapped() {
        let args = ModuleArgs::parse(
            r#"{"ANSIBLE_MODULE_ARGS": {"name": "test2", "_ansible_check_mode": true, "_ansible_verbosity": 2}}"#,
        )
        .unwrap();

        assert!(args.check_mode());
        assert_eq!(args.raw().len(), 1);

        let params: Params = args.params().unwrap();
        assert_eq!(params.name, "test2");
        assert!(params.description.is_none());
    }

    #[test]
    fn test_plain_yaml_map() {
        let args = ModuleArgs::parse("name: test\ndescription: from yaml\n").unwrap();
        assert!(!args.check_mode());

        let params: Params = args.params().unwrap();
        assert_eq!(params.description.as_deref(), Some("from yaml"));
    }

    #[test]
    fn test_wrong_shape_is_invalid_arguments() {
        let args = ModuleArgs::parse(r#"{"name": ["not", "a", "string"]}"#).unwrap();
        let err = args.params::<Params>().unwrap_err();
        assert_eq!(err.kind(), "InvalidArguments");
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ANSIBLE_MODULE_ARGS": {{"name": "from-file"}}}}"#).unwrap();

        let args = ModuleArgs::load_file(file.path()).unwrap();
        assert_eq!(args.params::<Params>().unwrap().name, "from-file");

        let err = ModuleArgs::load_file("/nonexistent/args.json").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
