//! Ownership marking for entities managed by these modules.
//!
//! Every entity created here carries the marker `ci.metal-stack.io/manager=ansible`,
//! either as a string tag, a label map entry or a project annotation depending on
//! what the remote entity supports. Entities without it are never updated or deleted.

use std::collections::BTreeMap;

/// Ownership marker key.
pub const OWNERSHIP_KEY: &str = "ci.metal-stack.io/manager";

/// Ownership marker value.
pub const OWNERSHIP_VALUE: &str = "ansible";

/// Ownership state of a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The entity carries the ownership marker.
    Managed,
    /// The entity exists but was not created by these modules.
    Foreign,
    /// The remote entity type has no field that can carry the marker.
    Unsupported,
}

impl Ownership {
    /// Maps a marker check to an ownership state.
    #[must_use]
    pub const fn from_marker(present: bool) -> Self {
        if present { Self::Managed } else { Self::Foreign }
    }
}

/// Returns the ownership marker in its `key=value` tag form.
#[must_use]
pub fn ownership_tag() -> String {
    format!("{OWNERSHIP_KEY}={OWNERSHIP_VALUE}")
}

/// Returns true if a tag list contains the ownership tag.
#[must_use]
pub fn has_tag(tags: &[String]) -> bool {
    let tag = ownership_tag();
    tags.iter().any(|t| *t == tag)
}

/// Returns true if a label map carries the ownership label.
#[must_use]
pub fn has_label(labels: &BTreeMap<String, String>) -> bool {
    labels.get(OWNERSHIP_KEY).is_some_and(|v| v == OWNERSHIP_VALUE)
}

/// Returns the desired tags followed by the ownership tag, without duplicates.
#[must_use]
pub fn with_tag(tags: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(tags.len() + 1);
    for tag in tags {
        if !result.contains(tag) {
            result.push(tag.clone());
        }
    }

    let own = ownership_tag();
    if !result.contains(&own) {
        result.push(own);
    }
    result
}

/// Returns the desired labels with the ownership label added.
#[must_use]
pub fn with_label(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut result = labels.clone();
    result.insert(OWNERSHIP_KEY.to_string(), OWNERSHIP_VALUE.to_string());
    result
}
