//! Error types for the metal-stack automation modules.
//!
//! This module provides the error hierarchy for every stage of a module
//! invocation: configuration, identity resolution and reconciliation, and
//! the remote metal-stack APIs.

use std::path::PathBuf;

use serde_json::{Map, Value, json};
use thiserror::Error;

/// The main error type for the metal-stack automation modules.
#[derive(Debug, Error)]
pub enum MetalError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconciliation errors.
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),

    /// Remote API errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A file or parameter set could not be parsed.
    #[error("Failed to parse {source_name}: {message}")]
    ParseError {
        /// What was being parsed (args file, inventory config, ...).
        source_name: String,
        /// Description of the parse error.
        message: String,
    },

    /// A required setting was neither passed as parameter nor found in the environment.
    #[error("Missing setting '{name}': pass it as parameter or set {env}")]
    MissingSetting {
        /// Parameter name.
        name: String,
        /// Environment variable(s) consulted.
        env: String,
    },
}

/// Errors raised while resolving and reconciling a single entity.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Required identity or scope fields are missing or malformed.
    #[error("{message}")]
    InvalidArguments {
        /// Description of the problem.
        message: String,
    },

    /// A natural-key search returned more than one entity.
    #[error("{kind} name is not unique within {scope}: found {count} entities for '{key}'")]
    AmbiguousMatch {
        /// Entity kind.
        kind: String,
        /// Scope the key was searched in.
        scope: String,
        /// The natural key.
        key: String,
        /// Number of matches.
        count: usize,
    },

    /// The entity exists but does not carry the ownership tag.
    #[error("{kind} {id} does not have label attached: {tag}")]
    NotManaged {
        /// Entity kind.
        kind: String,
        /// Entity identifier.
        id: String,
        /// The missing ownership tag.
        tag: String,
    },

    /// The remote rejected an update because the entity changed since it was read.
    #[error("{kind} {id} was modified concurrently: {message}")]
    ConcurrentModification {
        /// Entity kind.
        kind: String,
        /// Entity identifier.
        id: String,
        /// Message returned by the remote service.
        message: String,
    },
}

/// Remote API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or authorization was rejected.
    #[error("metal-stack authentication failed: {status} - {message}")]
    AuthenticationFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// API request failed.
    #[error("metal-stack API request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The remote detected a stale version on update.
    #[error("metal-stack API rejected a stale update: {message}")]
    Conflict {
        /// Error message from the API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with metal-stack: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from metal-stack API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Result type alias for module operations.
pub type Result<T> = std::result::Result<T, MetalError>;

impl MetalError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the machine-readable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigurationError",
            Self::Reconcile(ReconcileError::InvalidArguments { .. }) => "InvalidArguments",
            Self::Reconcile(ReconcileError::AmbiguousMatch { .. }) => "AmbiguousMatch",
            Self::Reconcile(ReconcileError::NotManaged { .. }) => "NotManaged",
            Self::Reconcile(ReconcileError::ConcurrentModification { .. }) => {
                "ConcurrentModification"
            }
            Self::Api(_) => "RemoteServiceError",
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => "InternalError",
        }
    }

    /// Returns the structured context fields of this error (identity, scope, status).
    #[must_use]
    pub fn context(&self) -> Map<String, Value> {
        let value = match self {
            Self::Reconcile(ReconcileError::AmbiguousMatch {
                kind,
                scope,
                key,
                count,
            }) => json!({ "entity": kind, "scope": scope, "key": key, "count": count }),
            Self::Reconcile(ReconcileError::NotManaged { kind, id, .. }) => {
                json!({ "entity": kind, "id": id })
            }
            Self::Reconcile(ReconcileError::ConcurrentModification { kind, id, .. }) => {
                json!({ "entity": kind, "id": id })
            }
            Self::Api(
                ApiError::RequestFailed { status, .. }
                | ApiError::AuthenticationFailed { status, .. },
            ) => json!({ "status": status }),
            Self::Api(ApiError::Conflict { .. }) => json!({ "status": 409 }),
            _ => json!({}),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl ConfigError {
    /// Creates a parse error for the named source.
    #[must_use]
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl ReconcileError {
    /// Creates an invalid-arguments error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}

impl ApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_taxonomy() {
        let err = MetalError::from(ReconcileError::invalid_arguments("missing"));
        assert_eq!(err.kind(), "InvalidArguments");

        let err = MetalError::from(ApiError::api_error(500, "boom"));
        assert_eq!(err.kind(), "RemoteServiceError");
        assert_eq!(err.context()["status"], 500);
    }

    #[test]
    fn test_ambiguous_match_context() {
        let err = MetalError::from(ReconcileError::AmbiguousMatch {
            kind: String::from("network"),
            scope: String::from("partition=fra-equ01, project=p1"),
            key: String::from("test"),
            count: 2,
        });

        let ctx = err.context();
        assert_eq!(ctx["entity"], "network");
        assert_eq!(ctx["count"], 2);
        assert!(err.to_string().contains("not unique"));
    }
}
