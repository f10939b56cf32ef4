use anyhow::Result;

use crate::Context;
use crate::cli::RefreshArgs;
use crate::engine::Session;
use crate::ui;

/// Re-read recorded resources and write what the server reports back to state
pub async fn run(ctx: &Context, args: RefreshArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let apply_ctx = ctx.apply_context(false);

    let report = super::refresh_session(ctx, &mut session, &apply_ctx, args.jobs).await?;
    let written = session.save_state()?;

    if !ctx.quiet {
        ui::success(&format!(
            "Refreshed {} ({} dropped)",
            ui::count(report.state.len(), "resource"),
            report.dropped.len()
        ));
        if written {
            ui::dim(&format!("State written to {}", session.state_path.display()));
        }
    }
    Ok(())
}
