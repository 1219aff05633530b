//! Reconciler for a single remote entity.
//!
//! This module implements the find-or-create, else-no-op, else-delete protocol
//! shared by every resource module. Entity specifics live behind the
//! [`Resource`] adapter trait; the reconciler owns the decision table and the
//! ownership discipline.

pub mod diff;
pub mod identity;
pub mod outcome;
pub mod ownership;

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ApiError, MetalError, ReconcileError, Result};

pub use diff::{Diff, DiffBuilder, DiffDetail};
pub use identity::{Identity, NaturalKey};
pub use outcome::Outcome;
pub use ownership::Ownership;

/// Target state requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// The entity must exist with the desired attributes.
    #[default]
    Present,
    /// The entity must not exist.
    Absent,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Action decided by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create a new entity.
    Create,
    /// Update changed fields of an existing entity.
    Update,
    /// Delete an existing entity.
    Delete,
    /// Nothing to do.
    NoChange,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

/// Adapter between the reconciler and one remote entity type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Remote entity record.
    type Entity: Send + Sync;
    /// Partial update payload.
    type Patch: Send;

    /// Entity kind used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Identity of the desired entity, derived from the parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if neither an id nor a complete natural key is given.
    fn identity(&self) -> Result<Identity>;

    /// Validates the remaining parameters before any remote call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` for malformed parameters.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Identifier of an entity.
    fn entity_id(&self, entity: &Self::Entity) -> String;

    /// Looks up an entity by id. `None` if it does not exist.
    async fn find(&self, id: &str) -> Result<Option<Self::Entity>>;

    /// Searches entities by natural key within its scope.
    async fn search(&self, key: &NaturalKey) -> Result<Vec<Self::Entity>>;

    /// Ownership state of an entity.
    fn ownership(&self, entity: &Self::Entity) -> Ownership;

    /// Compares desired parameters with an entity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if the parameters cannot be turned into a patch.
    fn diff(&self, entity: &Self::Entity) -> Result<Diff<Self::Patch>>;

    /// Creates the entity, injecting the ownership marker.
    async fn create(&self) -> Result<Self::Entity>;

    /// Applies a partial update.
    async fn update(&self, entity: &Self::Entity, patch: Self::Patch) -> Result<Self::Entity>;

    /// Deletes the entity. Returns the record the remote echoes back, if any.
    async fn delete(&self, entity: &Self::Entity) -> Result<Option<Self::Entity>>;

    /// Projects an entity into the caller-visible outcome.
    fn outcome(&self, entity: Option<&Self::Entity>, changed: bool) -> Outcome;
}

/// Reconciler driving one resource adapter.
pub struct Reconciler<'a, R: Resource + ?Sized> {
    /// Resource adapter.
    resource: &'a R,
    /// Decide without mutating.
    check_mode: bool,
}

impl<'a, R: Resource + ?Sized> Reconciler<'a, R> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(resource: &'a R) -> Self {
        Self {
            resource,
            check_mode: false,
        }
    }

    /// Enables check mode: resolve and decide, but never mutate.
    #[must_use]
    pub const fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Reconciles the remote entity towards the target state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments`, `AmbiguousMatch`, `NotManaged`,
    /// `ConcurrentModification` or the remote error that stopped the run.
    pub async fn reconcile(&self, target: TargetState) -> Result<Outcome> {
        let kind = self.resource.kind();
        let identity = self.resource.identity()?;
        self.resource.validate()?;

        info!("Reconciling {kind} {identity} to state {target}");

        let current = identity::resolve(self.resource, &identity).await?;

        match (target, current) {
            (TargetState::Present, None) => self.create().await,
            (TargetState::Present, Some(entity)) => self.converge(entity).await,
            (TargetState::Absent, None) => {
                debug!("{kind} {identity} does not exist, nothing to delete");
                Ok(self.resource.outcome(None, false))
            }
            (TargetState::Absent, Some(entity)) => self.remove(entity).await,
        }
    }

    async fn create(&self) -> Result<Outcome> {
        let kind = self.resource.kind();
        if self.check_mode {
            info!("Check mode: would {} {kind}", Action::Create);
            return Ok(self.resource.outcome(None, true));
        }

        let created = self.resource.create().await?;
        info!("Created {kind} {}", self.resource.entity_id(&created));
        Ok(self.resource.outcome(Some(&created), true))
    }

    async fn converge(&self, entity: R::Entity) -> Result<Outcome> {
        let kind = self.resource.kind();
        let id = self.resource.entity_id(&entity);
        let diff = self.resource.diff(&entity)?;

        if diff.is_empty() {
            debug!("{kind} {id} is up to date");
            return Ok(self.resource.outcome(Some(&entity), false));
        }

        self.ensure_managed(&entity, &id)?;
        info!("{} {kind} {id}: {diff}", Action::Update);

        if self.check_mode {
            return Ok(self.resource.outcome(Some(&entity), true));
        }

        let updated = self
            .resource
            .update(&entity, diff.patch)
            .await
            .map_err(|e| concurrent_modification(kind, &id, e))?;
        Ok(self.resource.outcome(Some(&updated), true))
    }

    async fn remove(&self, entity: R::Entity) -> Result<Outcome> {
        let kind = self.resource.kind();
        let id = self.resource.entity_id(&entity);

        self.ensure_managed(&entity, &id)?;
        info!("{} {kind} {id}", Action::Delete);

        if self.check_mode {
            return Ok(self.resource.outcome(Some(&entity), true));
        }

        let deleted = self.resource.delete(&entity).await?;
        Ok(self
            .resource
            .outcome(Some(deleted.as_ref().unwrap_or(&entity)), true))
    }

    fn ensure_managed(&self, entity: &R::Entity, id: &str) -> Result<()> {
        let kind = self.resource.kind();
        match self.resource.ownership(entity) {
            Ownership::Managed => Ok(()),
            Ownership::Foreign => Err(ReconcileError::NotManaged {
                kind: kind.to_string(),
                id: id.to_string(),
                tag: ownership::ownership_tag(),
            }
            .into()),
            Ownership::Unsupported => {
                warn!("{kind} {id} cannot carry an ownership marker, proceeding without check");
                Ok(())
            }
        }
    }
}

fn concurrent_modification(kind: &str, id: &str, err: MetalError) -> MetalError {
    match err {
        MetalError::Api(ApiError::Conflict { message }) => ReconcileError::ConcurrentModification {
            kind: kind.to_string(),
            id: id.to_string(),
            message,
        }
        .into(),
        other => other,
    }
}
