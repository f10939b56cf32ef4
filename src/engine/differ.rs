//! Plan display

use crate::ui;
use colored::Colorize;
use declarative::{Action, DiffSummary, ExecutionPlan, RefreshReport, ResourceDiff, group_by_type};

/// One-line plan summary
pub fn summary_line(summary: &DiffSummary) -> String {
    let mut line = format!(
        "{} to add, {} to change, {} to replace, {} to destroy",
        summary.additions, summary.updates, summary.replacements, summary.removals
    );
    if summary.unchanged > 0 {
        line.push_str(&format!(" ({} unchanged)", summary.unchanged));
    }
    line
}

/// Attribute lines shown under one planned change
pub fn detail_lines(diff: &ResourceDiff) -> Vec<String> {
    match diff.action {
        Action::Create => diff
            .desired
            .iter()
            .flat_map(|d| d.as_map().iter())
            .map(|(name, value)| format!("{name} = {}", ui::value(value)))
            .collect(),
        Action::Update | Action::Replace => diff
            .changes
            .iter()
            .map(|c| {
                let suffix = if c.requires_replace {
                    " (forces replacement)"
                } else {
                    ""
                };
                format!("{}: {} → {}{suffix}", c.name, ui::value(&c.from), ui::value(&c.to))
            })
            .collect(),
        Action::Delete | Action::NoOp => Vec::new(),
    }
}

/// Display an execution plan grouped by resource type
pub fn display_plan(plan: &ExecutionPlan) {
    let summary = plan.summary();
    if !summary.has_changes() {
        println!();
        println!(
            "  {} No changes needed ({} up to date)",
            "✓".green(),
            ui::count(summary.unchanged, "resource")
        );
        return;
    }

    let changes: Vec<ResourceDiff> = plan.changes().cloned().collect();

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (type_name, diffs) in group_by_type(&changes) {
        println!("│ {}", type_name.bold());
        for diff in diffs {
            println!(
                "│   {:<3} {}",
                ui::action_symbol(diff.action),
                diff.address.to_string().bold()
            );
            for line in detail_lines(diff) {
                println!("│         {}", line.dimmed());
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!("│ Plan: {}", summary_line(&summary));
    println!("└─────────────────────────────────────────────────────┘");
}

/// Report instances that vanished outside of this tool
pub fn display_refresh(report: &RefreshReport) {
    for address in &report.dropped {
        ui::warn(&format!(
            "{address} no longer exists on the server; it will be planned for creation again"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Address, AttributeChange, ResourceData};
    use serde_json::json;

    fn diff(action: Action) -> ResourceDiff {
        ResourceDiff {
            address: Address::new("grant", "readers"),
            action,
            tier: 2,
            prior: None,
            desired: None,
            changes: Vec::new(),
        }
    }

    #[test]
    fn test_summary_line() {
        let summary = DiffSummary {
            additions: 2,
            updates: 1,
            replacements: 0,
            removals: 1,
            unchanged: 3,
        };
        assert_eq!(
            summary_line(&summary),
            "2 to add, 1 to change, 0 to replace, 1 to destroy (3 unchanged)"
        );
        assert!(!summary_line(&DiffSummary::default()).contains("unchanged"));
    }

    #[test]
    fn test_create_lists_attributes() {
        let mut create = diff(Action::Create);
        let mut data = ResourceData::new();
        data.set("database", json!("app"));
        data.set("privileges", json!(["SELECT"]));
        create.desired = Some(data);
        assert_eq!(
            detail_lines(&create),
            vec!["database = \"app\"", "privileges = [\"SELECT\"]"]
        );
    }

    #[test]
    fn test_replace_marks_forcing_attributes() {
        let mut replace = diff(Action::Replace);
        replace.changes = vec![AttributeChange {
            name: "host".into(),
            from: json!("%"),
            to: json!("10.%"),
            requires_replace: true,
        }];
        assert_eq!(
            detail_lines(&replace),
            vec!["host: \"%\" → \"10.%\" (forces replacement)"]
        );
        assert!(detail_lines(&diff(Action::Delete)).is_empty());
    }
}
