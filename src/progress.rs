//! Progress indicators for the CLI.
//!
//! [`BarProgress`] feeds executor callbacks into an indicatif bar; [`spinner`]
//! covers single long-running calls.

use crate::ui;
use declarative::{ApplyResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "  {spinner:.cyan} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "  {spinner:.cyan} {msg}";

/// A spinner with a message, ticking until finished
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a spinner, leaving a success line
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::success(msg);
}

/// Finish a spinner, leaving an error line
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::error(msg);
}

/// Executor progress shown as one bar per batch
///
/// With `verbose`, every completed operation also gets its own line.
pub struct BarProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
    hidden: bool,
}

impl BarProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            bar: None,
            verbose,
            hidden: false,
        }
    }

    /// Progress that draws nothing (for --quiet)
    pub fn hidden() -> Self {
        Self {
            bar: None,
            verbose: false,
            hidden: true,
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, label: &str, count: usize) {
        let pb = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(count as u64)
        };
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.set_prefix(label.to_string());
        self.bar = Some(pb);
    }

    fn on_resource_start(&mut self, address: &str, description: &str) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{description} {address}"));
        }
    }

    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult) {
        let Some(pb) = &self.bar else {
            return;
        };
        pb.inc(1);
        pb.set_message(format!("{} {address}", ui::result_symbol(result)));
        if self.verbose || matches!(result, ApplyResult::Failed { .. }) {
            let detail = match result {
                ApplyResult::Failed { error } => format!(": {error}"),
                ApplyResult::Skipped { reason } => format!(" ({reason})"),
                _ => String::new(),
            };
            pb.println(format!("    {} {address}{detail}", ui::result_symbol(result)));
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_counts_completions() {
        let mut progress = BarProgress::hidden();
        progress.on_batch_start("Applying (tier 1)", 2);
        progress.on_resource_start("role.readers", "Creating");
        progress.on_resource_complete("role.readers", &ApplyResult::Created);
        progress.on_resource_complete(
            "role.writers",
            &ApplyResult::Failed {
                error: "denied".into(),
            },
        );
        assert_eq!(progress.bar.as_ref().map(ProgressBar::position), Some(2));
        progress.on_batch_complete();
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_complete_without_batch_is_ignored() {
        let mut progress = BarProgress::hidden();
        progress.on_resource_complete("role.readers", &ApplyResult::NoChange);
        assert!(progress.bar.is_none());
    }
}
