use colored::{ColoredString, Colorize};
use declarative::{Action, ApplyResult};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Plan and result symbols
// ============================================================================

/// Colored symbol for a planned action
pub fn action_symbol(action: Action) -> ColoredString {
    match action {
        Action::Create => action.symbol().green(),
        Action::Update => action.symbol().yellow(),
        Action::Replace => action.symbol().magenta(),
        Action::Delete => action.symbol().red(),
        Action::NoOp => action.symbol().dimmed(),
    }
}

/// Symbol for the outcome of one operation
pub fn result_symbol(result: &ApplyResult) -> ColoredString {
    match result {
        ApplyResult::NoChange => "○".dimmed(),
        ApplyResult::Created
        | ApplyResult::Updated
        | ApplyResult::Replaced
        | ApplyResult::Removed => "✓".green(),
        ApplyResult::Failed { .. } => "✗".red(),
        ApplyResult::Skipped { .. } => "⊘".yellow(),
    }
}

/// "1 resource", "3 resources"
pub fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Render a JSON attribute value compactly for one-line display
pub fn value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "(unset)".to_string(),
        serde_json::Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count() {
        assert_eq!(count(0, "change"), "0 changes");
        assert_eq!(count(1, "change"), "1 change");
        assert_eq!(count(2, "resource"), "2 resources");
    }

    #[test]
    fn test_value() {
        assert_eq!(value(&json!(null)), "(unset)");
        assert_eq!(value(&json!("utf8mb4")), "\"utf8mb4\"");
        assert_eq!(value(&json!(["SELECT", "INSERT"])), "[\"SELECT\",\"INSERT\"]");
        assert_eq!(value(&json!(false)), "false");
    }

    #[test]
    fn test_symbols_keep_text() {
        assert!(action_symbol(Action::Replace).to_string().contains("-/+"));
        assert!(result_symbol(&ApplyResult::Failed { error: "x".into() }).to_string().contains('✗'));
    }
}
