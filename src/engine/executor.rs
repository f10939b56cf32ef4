//! Execution engine - runs a plan with terminal UI and records the outcome

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{
    ApplyContext, ApplyResult, ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionPlan,
    StepOutcome,
};

use super::differ::display_plan;
use super::planner::Session;
use crate::progress::BarProgress;
use crate::ui;

/// Options for execution (includes `yes` for confirmation skip)
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of concurrent operations within one tier
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
    /// No progress bars
    pub quiet: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            verbose: false,
            quiet: false,
        }
    }
}

/// Confirmation through an interactive prompt, unless `--yes`
pub struct PromptConfirm {
    yes: bool,
}

impl PromptConfirm {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        println!();
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation (use --yes when not attached to a terminal)")
    }
}

/// Show the plan, execute it and write the outcome to state
///
/// State is saved even when some operations failed, so that everything
/// that did succeed is recorded.
pub async fn execute<C: ConfirmCallback>(
    session: &mut Session,
    plan: ExecutionPlan,
    opts: &ApplyOptions,
    ctx: &ApplyContext,
    confirm: &mut C,
) -> Result<ExecuteSummary> {
    display_plan(&plan);

    let mut progress = if opts.quiet {
        BarProgress::hidden()
    } else {
        BarProgress::new(opts.verbose)
    };
    let options = ExecuteOptions {
        dry_run: opts.dry_run,
        jobs: opts.jobs,
        verbose: opts.verbose,
    };
    if plan.has_changes() && !opts.dry_run {
        session.configure()?;
    }
    let report = declarative::execute(&session.types, plan, &options, ctx, &mut progress, confirm).await?;

    if session.state.apply_outcomes(&report.outcomes) {
        session.mark_dirty();
    }
    if !opts.dry_run && session.save_state()? {
        log::info!("State written to {}", session.state_path.display());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if report.summary.total_changes() + report.summary.failed + report.summary.skipped > 0 {
        print_failures(&report.outcomes);
        print_summary(&report.summary);
    }
    if ctx.is_cancelled() {
        ui::warn("Operation was interrupted; state records what completed");
    }

    Ok(report.summary)
}

fn print_failures(outcomes: &[StepOutcome]) {
    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match &o.result {
            ApplyResult::Failed { error } => Some((o, error)),
            _ => None,
        })
        .collect();
    if failed.is_empty() {
        return;
    }
    println!();
    println!("  {}", "Failures:".red().bold());
    for (outcome, error) in failed {
        println!("    {} {} ({}): {}", "✗".red(), outcome.address, outcome.action, error);
    }
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() && summary.skipped == 0 {
        println!("  {} Changes applied successfully!", "✓".green().bold());
    } else if summary.is_success() {
        println!("  {} No changes applied", "⊘".yellow().bold());
    } else {
        println!("  {} Changes applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", ui::count(summary.created, "resource"));
    }
    if summary.updated > 0 {
        println!("    • {} updated", ui::count(summary.updated, "resource"));
    }
    if summary.replaced > 0 {
        println!("    • {} replaced", ui::count(summary.replaced, "resource"));
    }
    if summary.removed > 0 {
        println!("    • {} removed", ui::count(summary.removed, "resource"));
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::count(summary.skipped, "resource"));
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
