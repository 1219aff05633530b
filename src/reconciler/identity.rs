//! Identity resolution.
//!
//! Resolves a declarative reference, either an explicit id or a natural key
//! within a scope, to at most one remote entity.

use std::fmt;

use tracing::debug;

use crate::error::{ReconcileError, Result};

use super::Resource;

/// How a desired entity is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Explicit system-assigned identifier.
    Id(String),
    /// Natural key unique within a scope.
    NaturalKey(NaturalKey),
}

/// A name scoped by its owning context (project, partition, tenant, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    /// The key itself, usually a name.
    pub key: String,
    /// Scope fields in declaration order.
    pub scope: Vec<(&'static str, String)>,
}

impl NaturalKey {
    /// Creates a key in the global scope.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scope: Vec::new(),
        }
    }

    /// Adds a scope field.
    #[must_use]
    pub fn scoped(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.scope.push((name, value.into()));
        self
    }

    /// Returns the value of a scope field.
    #[must_use]
    pub fn scope_value(&self, name: &str) -> Option<&str> {
        self.scope
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Describes the scope for messages, `global` when unscoped.
    #[must_use]
    pub fn describe_scope(&self) -> String {
        if self.scope.is_empty() {
            return String::from("global scope");
        }
        self.scope
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Identity {
    /// Builds an identity from optional parameters.
    ///
    /// An explicit id wins. Otherwise the key and every scope field must be set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` with `message` if neither form is complete.
    pub fn from_parts(
        id: Option<&str>,
        key: Option<&str>,
        scope: &[(&'static str, Option<&str>)],
        message: &str,
    ) -> Result<Self> {
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            return Ok(Self::Id(id.to_string()));
        }

        let Some(key) = key.filter(|s| !s.is_empty()) else {
            return Err(ReconcileError::invalid_arguments(message).into());
        };

        let mut natural = NaturalKey::new(key);
        for (name, value) in scope {
            match value.filter(|s| !s.is_empty()) {
                Some(v) => natural = natural.scoped(name, v),
                None => return Err(ReconcileError::invalid_arguments(message).into()),
            }
        }

        Ok(Self::NaturalKey(natural))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::NaturalKey(key) => write!(f, "'{}' ({})", key.key, key.describe_scope()),
        }
    }
}

/// Resolves an identity to zero or one entity.
///
/// Read-only: issues exactly one lookup or search call.
///
/// # Errors
///
/// Returns `AmbiguousMatch` when a natural-key search yields more than one
/// entity, or any remote error from the lookup.
pub async fn resolve<R: Resource + ?Sized>(
    resource: &R,
    identity: &Identity,
) -> Result<Option<R::Entity>> {
    match identity {
        Identity::Id(id) => {
            debug!("Looking up {} by id {id}", resource.kind());
            resource.find(id).await
        }
        Identity::NaturalKey(key) => {
            debug!(
                "Searching {} '{}' in {}",
                resource.kind(),
                key.key,
                key.describe_scope()
            );
            let mut found = resource.search(key).await?;
            match found.len() {
                0 | 1 => Ok(found.pop()),
                count => Err(ReconcileError::AmbiguousMatch {
                    kind: resource.kind().to_string(),
                    scope: key.describe_scope(),
                    key: key.key.clone(),
                    count,
                }
                .into()),
            }
        }
    }
}
