//! Execution engine - applies a plan tier by tier with bounded concurrency
//!
//! Deletions run first, from the highest tier down, so dependents go before
//! the things they depend on. Creations and updates follow from the lowest
//! tier up. A replacement is split across both phases: its delete half runs
//! with the deletions and its create half with the creations. Within a tier,
//! up to `jobs` operations run at once; a failure never stops its siblings.

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::{Action, Address, ResourceDiff};
use crate::planner::ExecutionPlan;
use crate::resource::{LifecycleError, ResourceTypes, SharedLifecycle};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceData};
use anyhow::{Result, anyhow, bail};
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::JoinSet;

/// How an operation changes the recorded state of an instance
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// Keep whatever was recorded
    Unchanged,
    /// Record new state
    Set(ResourceData),
    /// Forget the instance
    Remove,
}

/// Outcome of one planned change
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub address: Address,
    pub action: Action,
    pub result: ApplyResult,
    pub state: StateUpdate,
}

/// Everything an execution produced
#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    /// One entry per planned change, in address order
    pub outcomes: Vec<StepOutcome>,
}

/// Instances re-read from the backend
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Current state of every instance that still exists
    pub state: BTreeMap<Address, ResourceData>,
    /// Instances deleted outside of this tool
    pub dropped: Vec<Address>,
}

enum Op {
    Read(ResourceData),
    Delete(ResourceData),
    Create(ResourceData),
    Update(ResourceData, ResourceData),
}

impl Op {
    fn label(&self) -> &'static str {
        match self {
            Self::Read(_) => "Reading",
            Self::Delete(_) => "Destroying",
            Self::Create(_) => "Creating",
            Self::Update(..) => "Updating",
        }
    }
}

struct Step {
    address: Address,
    lifecycle: SharedLifecycle,
    op: Op,
}

impl Step {
    async fn run(self, ctx: ApplyContext) -> (Address, Result<Option<ResourceData>, LifecycleError>) {
        let result = match &self.op {
            Op::Read(prior) => self.lifecycle.read(&ctx, prior).await.map(Some),
            Op::Delete(prior) => self.lifecycle.delete(&ctx, prior).await.map(|()| None),
            Op::Create(desired) => self.lifecycle.create(&ctx, desired).await.map(Some),
            Op::Update(prior, desired) => self.lifecycle.update(&ctx, prior, desired).await.map(Some),
        };
        (self.address, result)
    }
}

enum StepStatus {
    Done(Option<ResourceData>),
    Failed(LifecycleError),
    Skipped(String),
}

/// Run steps with at most `jobs` in flight
async fn run_steps<P: ProgressCallback>(
    steps: Vec<Step>,
    jobs: usize,
    ctx: &ApplyContext,
    progress: &mut P,
) -> Vec<(Address, StepStatus)> {
    let jobs = jobs.max(1);
    let mut pending = steps.into_iter();
    let mut running: JoinSet<(Address, Result<Option<ResourceData>, LifecycleError>)> = JoinSet::new();
    let mut in_flight = BTreeSet::new();
    let mut join_errors = Vec::new();
    let mut done = Vec::new();

    loop {
        while running.len() < jobs {
            let Some(step) = pending.next() else {
                break;
            };
            if ctx.is_cancelled() {
                let status = StepStatus::Skipped("cancelled".to_string());
                progress.on_resource_complete(&step.address.to_string(), &status_result(&status));
                done.push((step.address, status));
                continue;
            }
            progress.on_resource_start(&step.address.to_string(), step.op.label());
            in_flight.insert(step.address.clone());
            running.spawn(step.run(ctx.clone()));
        }

        let Some(joined) = running.join_next().await else {
            break;
        };
        let (address, status) = match joined {
            Ok((address, Ok(state))) => (address, StepStatus::Done(state)),
            Ok((address, Err(e))) => (address, StepStatus::Failed(e)),
            Err(join_error) => {
                join_errors.push(join_error.to_string());
                continue;
            }
        };
        in_flight.remove(&address);
        progress.on_resource_complete(&address.to_string(), &status_result(&status));
        done.push((address, status));
    }

    // Tasks that panicked never reported their address
    let reason = join_errors.join("; ");
    for address in in_flight {
        let status = StepStatus::Failed(LifecycleError::Operation(anyhow!("task failed: {reason}")));
        progress.on_resource_complete(&address.to_string(), &status_result(&status));
        done.push((address, status));
    }

    done
}

fn status_result(status: &StepStatus) -> ApplyResult {
    match status {
        StepStatus::Done(_) => ApplyResult::NoChange,
        StepStatus::Failed(e) => ApplyResult::Failed {
            error: e.to_string(),
        },
        StepStatus::Skipped(reason) => ApplyResult::Skipped {
            reason: reason.clone(),
        },
    }
}

fn lifecycle(types: &ResourceTypes, address: &Address) -> Result<SharedLifecycle> {
    types
        .get(&address.type_name)
        .cloned()
        .ok_or_else(|| anyhow!("{address}: unknown resource type '{}'", address.type_name))
}

/// Re-read every instance in `prior`
///
/// Instances that report not-found are dropped; any other failure fails the
/// whole refresh after every read has finished.
pub async fn refresh<P: ProgressCallback>(
    types: &ResourceTypes,
    prior: BTreeMap<Address, ResourceData>,
    jobs: usize,
    ctx: &ApplyContext,
    progress: &mut P,
) -> Result<RefreshReport> {
    let mut steps = Vec::with_capacity(prior.len());
    for (address, data) in prior {
        steps.push(Step {
            lifecycle: lifecycle(types, &address)?,
            address,
            op: Op::Read(data),
        });
    }

    progress.on_batch_start("Refreshing state", steps.len());
    let results = run_steps(steps, jobs, ctx, progress).await;
    progress.on_batch_complete();

    let mut report = RefreshReport::default();
    let mut errors = Vec::new();
    for (address, status) in results {
        match status {
            StepStatus::Done(Some(state)) => {
                report.state.insert(address, state);
            }
            StepStatus::Done(None) => {}
            StepStatus::Failed(e) if e.is_not_found() => {
                log::warn!("{address} no longer exists ({e}); dropping it from state");
                report.dropped.push(address);
            }
            StepStatus::Failed(e) => errors.push(format!("{address}: {e}")),
            StepStatus::Skipped(reason) => errors.push(format!("{address}: {reason}")),
        }
    }

    if !errors.is_empty() {
        errors.sort();
        bail!("refresh failed:\n  {}", errors.join("\n  "));
    }
    report.dropped.sort();
    Ok(report)
}

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `types` - Resource types the plan's addresses refer to
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `ctx` - Cancellation and deadline for every operation
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
pub async fn execute<P, C>(
    types: &ResourceTypes,
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
    ctx: &ApplyContext,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let mut report = ExecuteReport::default();
    let (changes, unchanged): (Vec<ResourceDiff>, Vec<ResourceDiff>) =
        plan.diffs.into_iter().partition(|d| d.action.is_change());
    report.summary.no_change = unchanged.len();

    if changes.is_empty() {
        return Ok(report);
    }

    let skip_all = |reason: &str, changes: Vec<ResourceDiff>, report: &mut ExecuteReport| {
        for diff in changes {
            let result = ApplyResult::Skipped {
                reason: reason.to_string(),
            };
            report.summary.add_result(&result);
            report.outcomes.push(StepOutcome {
                address: diff.address,
                action: diff.action,
                result,
                state: StateUpdate::Unchanged,
            });
        }
    };

    if opts.dry_run {
        skip_all("dry run", changes, &mut report);
        return Ok(report);
    }

    if !confirm.confirm(&format!("Apply {} change(s)?", changes.len()))? {
        skip_all("not confirmed", changes, &mut report);
        return Ok(report);
    }

    let mut outcomes: BTreeMap<Address, StepOutcome> = BTreeMap::new();
    let mut by_address: BTreeMap<Address, ResourceDiff> = BTreeMap::new();
    for diff in changes {
        by_address.insert(diff.address.clone(), diff);
    }
    let tiers: BTreeSet<u8> = by_address.values().map(|d| d.tier).collect();

    // Phase 1: deletions, highest tier first
    let mut delete_failed = BTreeSet::new();
    for &tier in tiers.iter().rev() {
        let mut steps = Vec::new();
        for diff in by_address.values() {
            if diff.tier != tier || !matches!(diff.action, Action::Delete | Action::Replace) {
                continue;
            }
            let Some(prior) = diff.prior.clone() else {
                continue;
            };
            steps.push(Step {
                address: diff.address.clone(),
                lifecycle: lifecycle(types, &diff.address)?,
                op: Op::Delete(prior),
            });
        }
        if steps.is_empty() {
            continue;
        }

        progress.on_batch_start(&format!("Destroying (tier {tier})"), steps.len());
        for (address, status) in run_steps(steps, opts.jobs, ctx, progress).await {
            let action = by_address[&address].action;
            let (result, state) = match status {
                StepStatus::Done(_) if action == Action::Delete => (ApplyResult::Removed, StateUpdate::Remove),
                // Replacement continues in phase 2
                StepStatus::Done(_) => continue,
                StepStatus::Failed(e) => (
                    ApplyResult::Failed {
                        error: e.to_string(),
                    },
                    StateUpdate::Unchanged,
                ),
                StepStatus::Skipped(reason) => (ApplyResult::Skipped { reason }, StateUpdate::Unchanged),
            };
            if action == Action::Replace {
                delete_failed.insert(address.clone());
            }
            outcomes.insert(
                address.clone(),
                StepOutcome {
                    address,
                    action,
                    result,
                    state,
                },
            );
        }
        progress.on_batch_complete();
    }

    // Phase 2: creations and updates, lowest tier first
    for &tier in &tiers {
        let mut steps = Vec::new();
        for diff in by_address.values() {
            if diff.tier != tier || delete_failed.contains(&diff.address) {
                continue;
            }
            let op = match (diff.action, &diff.prior, &diff.desired) {
                (Action::Create | Action::Replace, _, Some(desired)) => Op::Create(desired.clone()),
                (Action::Update, Some(prior), Some(desired)) => Op::Update(prior.clone(), desired.clone()),
                _ => continue,
            };
            steps.push(Step {
                address: diff.address.clone(),
                lifecycle: lifecycle(types, &diff.address)?,
                op,
            });
        }
        if steps.is_empty() {
            continue;
        }

        progress.on_batch_start(&format!("Applying (tier {tier})"), steps.len());
        for (address, status) in run_steps(steps, opts.jobs, ctx, progress).await {
            let action = by_address[&address].action;
            let (result, state) = match (status, action) {
                (StepStatus::Done(Some(state)), Action::Create) => (ApplyResult::Created, StateUpdate::Set(state)),
                (StepStatus::Done(Some(state)), Action::Replace) => (ApplyResult::Replaced, StateUpdate::Set(state)),
                (StepStatus::Done(Some(state)), _) => (ApplyResult::Updated, StateUpdate::Set(state)),
                (StepStatus::Done(None), _) => (ApplyResult::NoChange, StateUpdate::Unchanged),
                // The old instance is already gone
                (StepStatus::Failed(e), Action::Replace) => (
                    ApplyResult::Failed {
                        error: e.to_string(),
                    },
                    StateUpdate::Remove,
                ),
                (StepStatus::Failed(e), _) => (
                    ApplyResult::Failed {
                        error: e.to_string(),
                    },
                    StateUpdate::Unchanged,
                ),
                (StepStatus::Skipped(reason), Action::Replace) => {
                    (ApplyResult::Skipped { reason }, StateUpdate::Remove)
                }
                (StepStatus::Skipped(reason), _) => (ApplyResult::Skipped { reason }, StateUpdate::Unchanged),
            };
            outcomes.insert(
                address.clone(),
                StepOutcome {
                    address,
                    action,
                    result,
                    state,
                },
            );
        }
        progress.on_batch_complete();
    }

    for outcome in outcomes.into_values() {
        if opts.verbose {
            log::info!("{}: {:?}", outcome.address, outcome.result);
        }
        report.summary.add_result(&outcome.result);
        report.outcomes.push(outcome);
    }
    Ok(report)
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub async fn execute_simple(
    types: &ResourceTypes,
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
    ctx: &ApplyContext,
) -> Result<ExecuteReport> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(types, plan, opts, ctx, &mut NoProgress, &mut AutoConfirm).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, Cancellation, NoProgress};
    use crate::planner::{plan, plan_destroy};
    use crate::resource::{Lifecycle, LifecycleResult};
    use crate::schema::{Attribute, Schema};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    /// Records every operation as "op:type.name"
    struct Recorder {
        type_name: &'static str,
        tier: u8,
        schema: Schema,
        log: Arc<Mutex<Vec<String>>>,
        fail_create: Option<&'static str>,
        missing: Option<&'static str>,
    }

    impl Recorder {
        fn new(type_name: &'static str, tier: u8, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                type_name,
                tier,
                schema: Schema::new(vec![
                    Attribute::scalar("name").requires_replace(),
                    Attribute::scalar("note").default_value(json!("")),
                ]),
                log: Arc::clone(log),
                fail_create: None,
                missing: None,
            }
        }

        fn record(&self, op: &str, data: &ResourceData) {
            let name = data.get_str("name").unwrap_or("?");
            self.log
                .lock()
                .unwrap()
                .push(format!("{op}:{}.{name}", self.type_name));
        }
    }

    #[async_trait]
    impl Lifecycle for Recorder {
        fn type_name(&self) -> &'static str {
            self.type_name
        }

        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn tier(&self) -> u8 {
            self.tier
        }

        fn validate(&self, _desired: &ResourceData) -> LifecycleResult<()> {
            Ok(())
        }

        async fn create(&self, _ctx: &ApplyContext, desired: &ResourceData) -> LifecycleResult<ResourceData> {
            self.record("create", desired);
            if desired.get_str("name") == self.fail_create {
                return Err(LifecycleError::Operation(anyhow!("create refused")));
            }
            let mut state = desired.clone();
            state.set("id", json!(1));
            Ok(state)
        }

        async fn read(&self, _ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<ResourceData> {
            if prior.get_str("name") == self.missing {
                return Err(LifecycleError::NotFound("gone".into()));
            }
            Ok(prior.clone())
        }

        async fn update(
            &self,
            _ctx: &ApplyContext,
            _prior: &ResourceData,
            desired: &ResourceData,
        ) -> LifecycleResult<ResourceData> {
            self.record("update", desired);
            Ok(desired.clone())
        }

        async fn delete(&self, _ctx: &ApplyContext, prior: &ResourceData) -> LifecycleResult<()> {
            self.record("delete", prior);
            Ok(())
        }
    }

    fn data(value: Value) -> ResourceData {
        match value {
            Value::Object(map) => ResourceData::from_map(map),
            _ => unreachable!(),
        }
    }

    fn entries(items: &[(&str, Value)]) -> BTreeMap<Address, ResourceData> {
        items
            .iter()
            .map(|(a, v)| (Address::parse(a).unwrap(), data(v.clone())))
            .collect()
    }

    fn setup(customize: impl FnOnce(&mut Recorder, &mut Recorder)) -> (ResourceTypes, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut low = Recorder::new("role", 1, &log);
        let mut high = Recorder::new("grant", 2, &log);
        customize(&mut low, &mut high);
        let mut types = ResourceTypes::new();
        types.register(Arc::new(low));
        types.register(Arc::new(high));
        (types, log)
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let (types, _) = setup(|_, _| {});
        let report = execute_simple(
            &types,
            ExecutionPlan::new(),
            &ExecuteOptions::default(),
            &ApplyContext::detached(),
        )
        .await
        .unwrap();
        assert_eq!(report.summary.total(), 0);
    }

    #[tokio::test]
    async fn test_tier_ordering_for_replacements() {
        let (types, log) = setup(|_, _| {});
        let prior = entries(&[
            ("role.r", json!({"name": "old_role", "note": ""})),
            ("grant.g", json!({"name": "old_grant", "note": ""})),
        ]);
        let desired = entries(&[
            ("role.r", json!({"name": "new_role"})),
            ("grant.g", json!({"name": "new_grant"})),
        ]);
        let plan = plan(&types, desired, prior).unwrap();

        let report = execute_simple(&types, plan, &ExecuteOptions::default(), &ApplyContext::detached())
            .await
            .unwrap();
        assert_eq!(report.summary.replaced, 2);
        assert_eq!(
            *log.lock().unwrap(),
            [
                "delete:grant.old_grant",
                "delete:role.old_role",
                "create:role.new_role",
                "create:grant.new_grant",
            ]
        );
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| matches!(o.state, StateUpdate::Set(_)))
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let (types, _) = setup(|_, grant| grant.fail_create = Some("bad"));
        let desired = entries(&[
            ("grant.a", json!({"name": "bad"})),
            ("grant.b", json!({"name": "good"})),
            ("role.c", json!({"name": "c", "note": "x"})),
        ]);
        let prior = entries(&[("role.c", json!({"name": "c", "note": ""}))]);
        let plan = plan(&types, desired, prior).unwrap();

        let opts = ExecuteOptions {
            jobs: 2,
            ..ExecuteOptions::default()
        };
        let report = execute_simple(&types, plan, &opts, &ApplyContext::detached())
            .await
            .unwrap();
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.updated, 1);
        let failed = report
            .outcomes
            .iter()
            .find(|o| o.address.name == "a")
            .unwrap();
        assert_eq!(failed.state, StateUpdate::Unchanged);
    }

    #[tokio::test]
    async fn test_dry_run_and_decline_change_nothing() {
        let (types, log) = setup(|_, _| {});
        let desired = entries(&[("role.r", json!({"name": "r"}))]);

        let opts = ExecuteOptions {
            dry_run: true,
            ..ExecuteOptions::default()
        };
        let plan1 = plan(&types, desired.clone(), BTreeMap::new()).unwrap();
        let report = execute_simple(&types, plan1, &opts, &ApplyContext::detached())
            .await
            .unwrap();
        assert_eq!(report.summary.skipped, 1);

        let plan2 = plan(&types, desired, BTreeMap::new()).unwrap();
        let report = execute(
            &types,
            plan2,
            &ExecuteOptions::default(),
            &ApplyContext::detached(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .await
        .unwrap();
        assert_eq!(report.summary.skipped, 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_pending_steps() {
        let (types, log) = setup(|_, _| {});
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let ctx = ApplyContext::new(&cancellation, false, false);

        let plan = plan_destroy(&types, entries(&[("role.r", json!({"name": "r"}))])).unwrap();
        let report = execute(
            &types,
            plan,
            &ExecuteOptions::default(),
            &ctx,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .await
        .unwrap();
        assert_eq!(report.summary.skipped, 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_drops_missing_instances() {
        let (types, _) = setup(|role, _| role.missing = Some("gone"));
        let prior = entries(&[
            ("role.a", json!({"name": "gone"})),
            ("role.b", json!({"name": "here"})),
        ]);

        let report = refresh(&types, prior, 4, &ApplyContext::detached(), &mut NoProgress)
            .await
            .unwrap();
        assert_eq!(report.dropped, vec![Address::new("role", "a")]);
        assert!(report.state.contains_key(&Address::new("role", "b")));
    }
}
