//! Field-level diffing between desired parameters and a remote entity.
//!
//! Only attributes the caller actually set take part in the comparison.
//! Tag lists and label maps are compared as sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// Detail about a single differing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffDetail {
    /// Field that differs.
    pub field: String,
    /// Current value on the remote entity.
    pub old_value: Option<String>,
    /// Desired value.
    pub new_value: Option<String>,
}

/// Result of comparing desired state with an entity: the differing fields
/// and the partial update payload carrying only those fields.
#[derive(Debug, Clone)]
pub struct Diff<P> {
    /// Differing fields.
    pub details: Vec<DiffDetail>,
    /// Partial update payload.
    pub patch: P,
}

impl<P> Diff<P> {
    /// Returns true if nothing differs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// Names of the differing fields.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.details.iter().map(|d| d.field.as_str()).collect()
    }
}

/// Accumulates differing fields while an adapter fills its patch.
#[derive(Debug, Default)]
pub struct DiffBuilder {
    details: Vec<DiffDetail>,
}

impl DiffBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            details: Vec::new(),
        }
    }

    /// Compares a scalar. Returns true (and records the change) if `desired`
    /// is set and differs from `current`.
    pub fn compare<T>(&mut self, field: &str, current: Option<&T>, desired: Option<&T>) -> bool
    where
        T: PartialEq + Serialize + ?Sized,
    {
        let Some(desired) = desired else {
            return false;
        };
        if current == Some(desired) {
            return false;
        }

        self.details.push(DiffDetail {
            field: field.to_string(),
            old_value: current.map(render),
            new_value: Some(render(desired)),
        });
        true
    }

    /// Compares two string lists as sets.
    pub fn compare_set(&mut self, field: &str, current: &[String], desired: &[String]) -> bool {
        let old: BTreeSet<&String> = current.iter().collect();
        let new: BTreeSet<&String> = desired.iter().collect();
        if old == new {
            return false;
        }

        self.details.push(DiffDetail {
            field: field.to_string(),
            old_value: Some(render(&old)),
            new_value: Some(render(&new)),
        });
        true
    }

    /// Compares two label maps.
    pub fn compare_map(
        &mut self,
        field: &str,
        current: &BTreeMap<String, String>,
        desired: &BTreeMap<String, String>,
    ) -> bool {
        if current == desired {
            return false;
        }

        self.details.push(DiffDetail {
            field: field.to_string(),
            old_value: Some(render(current)),
            new_value: Some(render(desired)),
        });
        true
    }

    /// Finishes the diff with the patch the adapter built.
    #[must_use]
    pub fn finish<P>(self, patch: P) -> Diff<P> {
        Diff {
            details: self.details,
            patch,
        }
    }
}

fn render<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::from("<unrenderable>"),
    }
}

impl fmt::Display for DiffDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.field,
            self.old_value.as_deref().unwrap_or("<unset>"),
            self.new_value.as_deref().unwrap_or("<unset>")
        )
    }
}

impl<P> fmt::Display for Diff<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, detail) in self.details.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{detail}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_desired_is_ignored() {
        let mut diff = DiffBuilder::new();
        assert!(!diff.compare::<str>("description", Some("old"), None));
        assert!(diff.finish(()).is_empty());
    }

    #[test]
    fn test_scalar_change_is_recorded() {
        let mut diff = DiffBuilder::new();
        assert!(diff.compare("description", Some("old"), Some("new")));
        assert!(!diff.compare("name", Some("same"), Some("same")));

        let diff = diff.finish(());
        assert_eq!(diff.fields(), vec!["description"]);
        assert_eq!(diff.to_string(), "description: old -> new");
    }

    #[test]
    fn test_sets_ignore_order() {
        let mut diff = DiffBuilder::new();
        let a = vec![String::from("x"), String::from("y")];
        let b = vec![String::from("y"), String::from("x")];
        assert!(!diff.compare_set("tags", &a, &b));
        assert!(diff.compare_set("tags", &a, &[String::from("x")]));
    }
}
