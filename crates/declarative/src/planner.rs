//! Execution planner - joins configuration with state into a plan

use crate::diff::{Action, Address, DiffSummary, ResourceDiff};
use crate::resource::{Lifecycle, ResourceTypes};
use crate::types::ResourceData;
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};

/// An execution plan: one diff per instance, in address order
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub diffs: Vec<ResourceDiff>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter plan to only include instances matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (type_name, name) = parse_target(t);
                Self {
                    diffs: self
                        .diffs
                        .into_iter()
                        .filter(|d| matches_filter(&d.address, type_name, name))
                        .collect(),
                }
            }
        }
    }

    /// Diffs that require an action
    pub fn changes(&self) -> impl Iterator<Item = &ResourceDiff> {
        self.diffs.iter().filter(|d| d.action.is_change())
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(&self.diffs)
    }

    /// Total number of instances in the plan
    pub fn total_resources(&self) -> usize {
        self.diffs.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('.') {
        Some((type_name, name)) => (type_name, Some(name)),
        None => (target, None),
    }
}

/// Check if an address matches the filter criteria
fn matches_filter(address: &Address, type_name: &str, name: Option<&str>) -> bool {
    if address.type_name != type_name {
        return false;
    }
    if let Some(n) = name
        && address.name != n
    {
        return false;
    }
    true
}

fn lifecycle_for<'a>(types: &'a ResourceTypes, address: &Address) -> Result<&'a dyn Lifecycle> {
    match types.get(&address.type_name) {
        Some(lifecycle) => Ok(lifecycle.as_ref()),
        None => bail!(
            "{address}: unknown resource type '{}' (known: {})",
            address.type_name,
            types.names().collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Fill defaults and validate every desired instance
///
/// Every problem is collected before failing.
pub fn prepare_desired(
    types: &ResourceTypes,
    desired: BTreeMap<Address, ResourceData>,
) -> Result<BTreeMap<Address, ResourceData>> {
    let mut problems = Vec::new();
    let mut prepared = BTreeMap::new();

    for (address, mut data) in desired {
        let lifecycle = match lifecycle_for(types, &address) {
            Ok(l) => l,
            Err(e) => {
                problems.push(e.to_string());
                continue;
            }
        };
        let schema_problems = lifecycle.schema().check(&data);
        if !schema_problems.is_empty() {
            problems.extend(schema_problems.into_iter().map(|p| format!("{address}: {p}")));
            continue;
        }
        lifecycle.schema().apply_defaults(&mut data);
        if let Err(e) = lifecycle.validate(&data) {
            problems.push(format!("{address}: {e}"));
            continue;
        }
        prepared.insert(address, data);
    }

    if !problems.is_empty() {
        bail!(
            "configuration has {} problem(s):\n  {}",
            problems.len(),
            problems.join("\n  ")
        );
    }
    Ok(prepared)
}

/// Plan the changes that converge `prior` state onto `desired` configuration
pub fn plan(
    types: &ResourceTypes,
    desired: BTreeMap<Address, ResourceData>,
    mut prior: BTreeMap<Address, ResourceData>,
) -> Result<ExecutionPlan> {
    let mut desired = prepare_desired(types, desired)?;

    let addresses: BTreeSet<Address> = desired.keys().chain(prior.keys()).cloned().collect();
    let mut diffs = Vec::with_capacity(addresses.len());
    for address in addresses {
        let lifecycle = lifecycle_for(types, &address)?;
        let prior = prior.remove(&address);
        let desired = desired.remove(&address);
        diffs.push(ResourceDiff::compute(lifecycle, address, prior, desired));
    }

    Ok(ExecutionPlan { diffs })
}

/// Plan the deletion of every instance in `prior`
pub fn plan_destroy(
    types: &ResourceTypes,
    prior: BTreeMap<Address, ResourceData>,
) -> Result<ExecutionPlan> {
    let mut diffs = Vec::with_capacity(prior.len());
    for (address, data) in prior {
        let lifecycle = lifecycle_for(types, &address)?;
        diffs.push(ResourceDiff::compute(lifecycle, address, Some(data), None));
    }
    debug_assert!(diffs.iter().all(|d| d.action == Action::Delete));
    Ok(ExecutionPlan { diffs })
}
