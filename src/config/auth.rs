//! API connection settings.
//!
//! Every module accepts its connection settings as parameters and falls back
//! to the environment variables metalctl uses. Settings are resolved once per
//! invocation, before any reconciliation starts.

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Default HMAC user (auth type) for the metal-api.
pub const DEFAULT_HMAC_USER: &str = "Metal-Edit";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials used to authenticate against a metal-stack API.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Bearer token.
    Token(String),
    /// HMAC shared secret with its auth type.
    Hmac {
        /// HMAC user, e.g. `Metal-Edit`.
        user: String,
        /// Shared secret.
        key: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => write!(f, "Token(***)"),
            Self::Hmac { user, .. } => write!(f, "Hmac({user}, ***)"),
        }
    }
}

/// Resolved connection settings for one API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL of the API.
    pub url: String,
    /// Credentials.
    pub credentials: Credentials,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Connection parameters accepted by the metal-api v1 modules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiParams {
    /// API URL (`METALCTL_API_URL`).
    #[serde(default)]
    pub api_url: Option<String>,
    /// HMAC secret (`METALCTL_HMAC`).
    #[serde(default)]
    pub api_hmac: Option<String>,
    /// HMAC user.
    #[serde(default)]
    pub api_hmac_user: Option<String>,
    /// API token (`METALCTL_APITOKEN`).
    #[serde(default)]
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub api_timeout: Option<u64>,
}

/// Connection parameters accepted by the metal-apiserver v2 modules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiV2Params {
    /// API URL (`METALCTLV2_API_URL`).
    #[serde(default)]
    pub api_url: Option<String>,
    /// API token (`METALCTLV2_API_TOKEN`).
    #[serde(default)]
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub api_timeout: Option<u64>,
}

impl ApiParams {
    /// Resolves the settings against the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or every credential is missing.
    pub fn resolve(&self) -> Result<ApiConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves the settings with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or every credential is missing.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ApiConfig> {
        let url = first_set(&[
            self.api_url.clone(),
            env("METALCTL_API_URL"),
            env("METALCTL_URL"),
        ])
        .ok_or_else(|| ConfigError::MissingSetting {
            name: String::from("api_url"),
            env: String::from("METALCTL_API_URL"),
        })?;

        let token = first_set(&[self.api_token.clone(), env("METALCTL_APITOKEN")]);
        let hmac = first_set(&[self.api_hmac.clone(), env("METALCTL_HMAC")]);

        let credentials = match (token, hmac) {
            (Some(token), _) => Credentials::Token(token),
            (None, Some(key)) => Credentials::Hmac {
                user: first_set(&[self.api_hmac_user.clone(), env("METALCTL_HMAC_AUTH_TYPE")])
                    .unwrap_or_else(|| DEFAULT_HMAC_USER.to_string()),
                key,
            },
            (None, None) => {
                return Err(ConfigError::MissingSetting {
                    name: String::from("api_token or api_hmac"),
                    env: String::from("METALCTL_APITOKEN or METALCTL_HMAC"),
                }
                .into());
            }
        };

        debug!("Using metal-api at {url}");
        Ok(ApiConfig {
            url: trim_url(&url),
            credentials,
            timeout_secs: self.api_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

impl ApiV2Params {
    /// Resolves the settings against the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or token is missing.
    pub fn resolve(&self) -> Result<ApiConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves the settings with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or token is missing.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ApiConfig> {
        let url = first_set(&[self.api_url.clone(), env("METALCTLV2_API_URL")]).ok_or_else(
            || ConfigError::MissingSetting {
                name: String::from("api_url"),
                env: String::from("METALCTLV2_API_URL"),
            },
        )?;

        let token = first_set(&[self.api_token.clone(), env("METALCTLV2_API_TOKEN")])
            .ok_or_else(|| ConfigError::MissingSetting {
                name: String::from("api_token"),
                env: String::from("METALCTLV2_API_TOKEN"),
            })?;

        debug!("Using metal-apiserver at {url}");
        Ok(ApiConfig {
            url: trim_url(&url),
            credentials: Credentials::Token(token),
            timeout_secs: self.api_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

fn first_set(candidates: &[Option<String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
        .cloned()
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
