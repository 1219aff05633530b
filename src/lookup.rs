//! Read-only lookup of metal-api entities.
//!
//! `get` fetches one entity by id, `search` lists or searches all entities of
//! a kind. Results are raw API records so playbooks see every field.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ReconcileError, Result};
use crate::metal::{MetalClient, path_segment};

/// Raw JSON access to the metal-api.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Requester: Send + Sync {
    /// GETs a path.
    async fn get_json(&self, path: &str) -> Result<Value>;

    /// POSTs a JSON body to a path.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
}

#[async_trait]
impl Requester for MetalClient {
    async fn get_json(&self, path: &str) -> Result<Value> {
        Self::get_json(self, path).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        Self::post_json(self, path, body).await
    }
}

/// Entity kinds available for lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Images.
    Image,
    /// IP addresses.
    Ip,
    /// Firewalls.
    Firewall,
    /// Machines.
    Machine,
    /// Networks.
    Network,
    /// Partitions.
    Partition,
    /// Projects.
    Project,
    /// Sizes.
    Size,
    /// Switches.
    Switch,
}

impl EntityKind {
    /// All kinds.
    pub const ALL: [Self; 9] = [
        Self::Image,
        Self::Ip,
        Self::Firewall,
        Self::Machine,
        Self::Network,
        Self::Partition,
        Self::Project,
        Self::Size,
        Self::Switch,
    ];

    /// Name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Ip => "ip",
            Self::Firewall => "firewall",
            Self::Machine => "machine",
            Self::Network => "network",
            Self::Partition => "partition",
            Self::Project => "project",
            Self::Size => "size",
            Self::Switch => "switch",
        }
    }

    /// Whether `search` posts the query to a find endpoint.
    #[must_use]
    pub const fn has_find(self) -> bool {
        matches!(
            self,
            Self::Machine | Self::Network | Self::Ip | Self::Firewall | Self::Project
        )
    }

    fn path(self) -> String {
        format!("/v1/{}", self.name())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntityKind {
    type Err = crate::error::MetalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|k| k.name() == s).ok_or_else(|| {
            let allowed: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
            ReconcileError::invalid_arguments(format!(
                "unsupported entity '{s}', must be one of: {}",
                allowed.join(", ")
            ))
            .into()
        })
    }
}

/// Lookup request types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestKind {
    /// Fetch one entity by id.
    #[default]
    Get,
    /// List entities matching the query.
    Search,
}

impl FromStr for RequestKind {
    type Err = crate::error::MetalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "get" => Ok(Self::Get),
            "search" => Ok(Self::Search),
            other => Err(ReconcileError::invalid_arguments(format!(
                "unsupported request type '{other}', must be one of: get, search"
            ))
            .into()),
        }
    }
}

/// Builds the query from `key=value` pairs.
///
/// A leading underscore is stripped from keys. Values are passed as given,
/// always as strings.
///
/// # Errors
///
/// Returns `InvalidArguments` for a pair without `=`.
pub fn parse_query<S: AsRef<str>>(pairs: &[S]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| {
            let pair = pair.as_ref();
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ReconcileError::invalid_arguments(format!(
                    "query term '{pair}' must have the form key=value"
                ))
                .into());
            };
            Ok((
                key.strip_prefix('_').unwrap_or(key).to_string(),
                Value::from(value),
            ))
        })
        .collect()
}

/// Runs a lookup.
///
/// `get` yields a one-element list with the record, `search` a one-element
/// list with the list of records.
///
/// # Errors
///
/// Returns `InvalidArguments` if `get` has no `id`, or the remote error.
pub async fn lookup<R: Requester + ?Sized>(
    requester: &R,
    request: RequestKind,
    entity: EntityKind,
    query: &Map<String, Value>,
) -> Result<Value> {
    debug!("Lookup {entity} ({request:?}) with {} query terms", query.len());

    match request {
        RequestKind::Get => {
            let Some(id) = query.get("id").and_then(Value::as_str) else {
                return Err(ReconcileError::invalid_arguments("id must be present").into());
            };
            let record = requester
                .get_json(&format!("{}/{}", entity.path(), path_segment(id)))
                .await?;
            Ok(json!([record]))
        }
        RequestKind::Search if entity.has_find() => {
            let records = requester
                .post_json(
                    &format!("{}/find", entity.path()),
                    &Value::Object(query.clone()),
                )
                .await?;
            Ok(json!([records]))
        }
        RequestKind::Search => {
            let records = requester.get_json(&entity.path()).await?;
            Ok(json!([records]))
        }
    }
}
