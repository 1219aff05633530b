//! Configuration for the metal-stack automation modules.
//!
//! This module handles all configuration-related functionality:
//! - API connection settings from parameters and environment
//! - Ansible module argument files
//! - The dynamic inventory configuration file

mod args;
mod auth;
mod inventory;

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

pub use args::ModuleArgs;
pub use auth::{
    ApiConfig, ApiParams, ApiV2Params, Credentials, DEFAULT_HMAC_USER, DEFAULT_TIMEOUT_SECS,
};
pub use inventory::{InventoryConfig, ScopeFilter, find_config_file};

/// Loads a `.env` file.
///
/// Without an explicit path, `.env` in the working directory is loaded if it
/// exists. An explicit path must exist.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, or a file exists but
/// cannot be loaded.
pub fn load_dotenv(path: Option<&Path>) -> Result<()> {
    let env_path = match path {
        Some(path) if !path.exists() => {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Some(path) => path.to_path_buf(),
        None => Path::new(".env").to_path_buf(),
    };

    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(&env_path)
            .map_err(|e| ConfigError::parse(env_path.display().to_string(), e.to_string()))?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}
