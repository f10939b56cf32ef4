use anyhow::Result;

use crate::Context;
use crate::cli::PlanArgs;
use crate::engine::{Session, differ};
use crate::ui;

/// Show what apply would change
///
/// Refreshes in memory only; the state file is left as it is.
pub async fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let apply_ctx = ctx.apply_context(true);

    super::refresh_session(ctx, &mut session, &apply_ctx, args.jobs).await?;
    let plan = session.plan(args.target.as_deref())?;
    differ::display_plan(&plan);
    if session.is_dirty() && !ctx.quiet {
        ui::dim("Recorded state is out of date; `refresh` or `apply` will update it");
    }
    Ok(())
}
