//! Diff summaries reported by a synchronization

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a synchronization did to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceOp {
    /// Resource was created
    Create,
    /// Resource was updated in place
    Update,
    /// Resource was deleted
    Delete,
    /// Resource already matched the desired state
    Same,
}

impl ResourceOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceOp::Create => "create",
            ResourceOp::Update => "update",
            ResourceOp::Delete => "delete",
            ResourceOp::Same => "same",
        }
    }
}

impl std::fmt::Display for ResourceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single resource change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Logical resource name
    pub name: String,

    /// Provider type token
    pub resource_type: String,

    pub op: ResourceOp,
}

impl ResourceChange {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, op: ResourceOp) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            op,
        }
    }
}

/// Counts of resource operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub same: usize,
}

impl DiffSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_changes(changes: &[ResourceChange]) -> Self {
        let mut summary = Self::empty();
        for change in changes {
            summary.record(change.op);
        }
        summary
    }

    /// Builds a summary from a backend's `{"create": n, ...}` map
    ///
    /// Replacements count as updates; unknown operations are ignored.
    pub fn from_resource_changes(changes: &BTreeMap<String, usize>) -> Self {
        let mut summary = Self::empty();
        for (op, count) in changes {
            match op.as_str() {
                "create" => summary.create += count,
                "update" | "replace" => summary.update += count,
                "delete" => summary.delete += count,
                "same" => summary.same += count,
                other => tracing::debug!("Ignoring resource change kind: {}", other),
            }
        }
        summary
    }

    pub fn record(&mut self, op: ResourceOp) {
        match op {
            ResourceOp::Create => self.create += 1,
            ResourceOp::Update => self.update += 1,
            ResourceOp::Delete => self.delete += 1,
            ResourceOp::Same => self.same += 1,
        }
    }

    /// Non-zero counts keyed by operation name
    pub fn resource_changes(&self) -> BTreeMap<String, usize> {
        [
            (ResourceOp::Create, self.create),
            (ResourceOp::Update, self.update),
            (ResourceOp::Delete, self.delete),
            (ResourceOp::Same, self.same),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(op, count)| (op.to_string(), count))
        .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.create + self.update + self.delete > 0
    }

    pub fn total(&self) -> usize {
        self.create + self.update + self.delete + self.same
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.same
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_changes() {
        let changes = vec![
            ResourceChange::new("resourceGroup", "azure-native:resources:ResourceGroup", ResourceOp::Same),
            ResourceChange::new("webApp", "azure-native:web:WebApp", ResourceOp::Create),
            ResourceChange::new("appInsights", "azure-native:insights:Component", ResourceOp::Update),
        ];
        let summary = DiffSummary::from_changes(&changes);

        assert!(summary.has_changes());
        assert_eq!(summary.total(), 3);
        assert_eq!(
            summary.to_string(),
            "1 to create, 1 to update, 0 to delete, 1 unchanged"
        );
    }

    #[test]
    fn test_resource_changes_map_skips_zero() {
        let summary = DiffSummary {
            create: 0,
            update: 0,
            delete: 0,
            same: 5,
        };
        assert!(!summary.has_changes());

        let map = summary.resource_changes();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("same"), Some(&5));
    }

    #[test]
    fn test_from_backend_map_folds_replace_into_update() {
        let map: BTreeMap<String, usize> = [
            ("create".to_string(), 2),
            ("replace".to_string(), 1),
            ("update".to_string(), 1),
            ("refresh".to_string(), 7),
        ]
        .into_iter()
        .collect();

        let summary = DiffSummary::from_resource_changes(&map);
        assert_eq!(summary.create, 2);
        assert_eq!(summary.update, 2);
        assert_eq!(summary.same, 0);
    }
}
