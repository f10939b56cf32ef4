//! Command implementations

pub mod apply;
pub mod database;
pub mod plan;
pub mod refresh;
pub mod state;
pub mod validate;

use anyhow::Result;
use declarative::{ApplyContext, RefreshReport};

use crate::Context;
use crate::engine::{Session, differ};
use crate::progress::BarProgress;

/// Bring recorded state up to date before planning
pub(crate) async fn refresh_session(
    ctx: &Context,
    session: &mut Session,
    apply_ctx: &ApplyContext,
    jobs: usize,
) -> Result<RefreshReport> {
    let mut progress = if ctx.quiet {
        BarProgress::hidden()
    } else {
        BarProgress::new(ctx.verbose > 1)
    };
    let report = session.refresh(apply_ctx, jobs, &mut progress).await?;
    if !ctx.quiet {
        differ::display_refresh(&report);
    }
    Ok(report)
}
