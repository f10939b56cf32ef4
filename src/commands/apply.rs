//! `apply` and `destroy`

use anyhow::{Result, bail};
use declarative::ExecuteSummary;

use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs};
use crate::engine::executor::PromptConfirm;
use crate::engine::{ApplyOptions, Session, execute};
use crate::ui;

/// Make the server match the manifest
pub async fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let apply_ctx = ctx.apply_context(args.dry_run);

    super::refresh_session(ctx, &mut session, &apply_ctx, args.jobs).await?;
    let plan = session.plan(args.target.as_deref())?;

    let opts = ApplyOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
        yes: args.yes,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };
    let mut confirm = PromptConfirm::new(opts.yes);
    let summary = execute(&mut session, plan, &opts, &apply_ctx, &mut confirm).await?;
    finish(&summary)
}

/// Remove every recorded resource (or the targeted ones)
pub async fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let apply_ctx = ctx.apply_context(false);

    super::refresh_session(ctx, &mut session, &apply_ctx, args.jobs).await?;
    let plan = session.plan_destroy(args.target.as_deref())?;
    if !plan.has_changes() {
        ui::info("Nothing recorded in state to destroy");
        session.save_state()?;
        return Ok(());
    }

    let opts = ApplyOptions {
        dry_run: false,
        jobs: args.jobs,
        yes: args.yes,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };
    let mut confirm = PromptConfirm::new(opts.yes);
    let summary = execute(&mut session, plan, &opts, &apply_ctx, &mut confirm).await?;
    finish(&summary)
}

fn finish(summary: &ExecuteSummary) -> Result<()> {
    if summary.failed > 0 {
        bail!("{} failed", ui::count(summary.failed, "operation"));
    }
    Ok(())
}
