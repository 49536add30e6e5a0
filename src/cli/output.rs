//! CLI output formatting

use crate::core::error::{ModelError, ValidationError};
use crate::core::node::TypedNode;
use crate::core::state::{ResultValue, StateValue, TransitionCheck};
use crate::core::timestamp::format_timestamp;
use crate::query::{Condition, Filter};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");

/// Format a node state for display
pub fn format_state(state: StateValue) -> String {
    match state {
        StateValue::Running => style("RUNNING").yellow().to_string(),
        StateValue::Available => style("AVAILABLE").cyan().to_string(),
        StateValue::Closing => style("CLOSING").blue().to_string(),
        StateValue::Done => style("DONE").green().to_string(),
    }
}

/// Format a node result for display
pub fn format_result(result: Option<ResultValue>) -> String {
    match result {
        Some(ResultValue::Pass) => style("PASS").green().to_string(),
        Some(ResultValue::Fail) => style("FAIL").red().to_string(),
        Some(ResultValue::Skip) => style("SKIP").dim().to_string(),
        Some(ResultValue::Incomplete) => style("INCOMPLETE").yellow().to_string(),
        None => style("-").dim().to_string(),
    }
}

/// One-line node summary
pub fn format_node(node: &TypedNode) -> String {
    format!(
        "{} {} [{}] {} {} (created {})",
        INFO,
        style(node.kind()).cyan(),
        style(node.display_id()).dim(),
        style(node.path().join("/")).bold(),
        format_state(node.state()),
        style(format_timestamp(&node.created())).dim()
    )
}

/// Format the outcome of a transition check
pub fn format_transition(from: StateValue, to: StateValue, check: &TransitionCheck) -> String {
    let icon = if check.allowed { CHECK } else { CROSS };
    format!(
        "{} {} → {}: {}",
        icon,
        format_state(from),
        format_state(to),
        check.reason
    )
}

/// Format a translated filter, one field per line
pub fn format_filter(filter: &Filter) -> String {
    filter
        .iter()
        .map(|(field, condition)| match condition {
            Condition::Eq(value) => format!("  {} = {}", style(field).bold(), style(value).cyan()),
            Condition::Ops(ops) => ops
                .iter()
                .map(|(op, value)| format!("  {} {} {}", style(field).bold(), style(op).yellow(), style(value).cyan()))
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a model error, listing every offending field of a validation error
pub fn format_model_error(err: &ModelError) -> String {
    match err {
        ModelError::Validation(ValidationError { kind, errors }) => {
            let mut lines = vec![format!("{} Invalid {} document:", CROSS, style(kind).bold())];
            for e in errors {
                lines.push(format!("  {}: {}", style(&e.field).red(), e.message));
            }
            lines.join("\n")
        }
        other => format!("{} {}", CROSS, style(other).red()),
    }
}
