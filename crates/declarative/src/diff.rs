//! Diff computation for resource instances

use crate::resource::Lifecycle;
use crate::schema::AttributeChange;
use crate::types::ResourceData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Address of a resource instance: `<type>.<name>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub type_name: String,
    pub name: String,
}

impl Address {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Parse `type.name`; the name may itself contain dots
    pub fn parse(address: &str) -> Option<Self> {
        let (type_name, name) = address.split_once('.')?;
        if type_name.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(type_name, name))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.name)
    }
}

/// What has to happen to one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    NoOp,
    Create,
    Update,
    Replace,
    Delete,
}

impl Action {
    /// Short symbol used in plan output
    pub fn symbol(self) -> &'static str {
        match self {
            Self::NoOp => " ",
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
        }
    }

    pub fn is_change(self) -> bool {
        self != Self::NoOp
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A planned change to one instance
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDiff {
    pub address: Address,
    pub action: Action,
    /// Dependency tier of the resource type
    pub tier: u8,
    /// State before the change
    pub prior: Option<ResourceData>,
    /// Configuration after defaults
    pub desired: Option<ResourceData>,
    /// Attribute-level differences (updates and replacements only)
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    /// Compare one instance's prior state with its desired configuration
    pub fn compute(
        lifecycle: &dyn Lifecycle,
        address: Address,
        prior: Option<ResourceData>,
        desired: Option<ResourceData>,
    ) -> Self {
        let (action, changes) = match (&prior, &desired) {
            (None, Some(_)) => (Action::Create, Vec::new()),
            (Some(_), None) => (Action::Delete, Vec::new()),
            (None, None) => (Action::NoOp, Vec::new()),
            (Some(prior), Some(desired)) => {
                let changes = lifecycle.schema().changes(prior, desired);
                let action = if changes.is_empty() {
                    Action::NoOp
                } else if changes.iter().any(|c| c.requires_replace) {
                    Action::Replace
                } else {
                    Action::Update
                };
                (action, changes)
            }
        };
        Self {
            address,
            action,
            tier: lifecycle.tier(),
            prior,
            desired,
            changes,
        }
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub updates: usize,
    pub replacements: usize,
    pub removals: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                Action::Create => summary.additions += 1,
                Action::Update => summary.updates += 1,
                Action::Replace => summary.replacements += 1,
                Action::Delete => summary.removals += 1,
                Action::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.updates + self.replacements + self.removals
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<&str, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<&str, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.address.type_name.as_str())
            .or_default()
            .push(diff);
    }
    groups
}
