//! CLI output formatting and display helpers.
//!
//! Everything here goes to stdout; logs and the spinner use stderr.

use dumpany_core::{EntityOutcome, EntitySummary, ResolvedEntity, RunSummary};

/// Width of the company column in the summary table.
const NAME_COLUMN: usize = 32;

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// Lines listing the companies about to be synced.
pub fn entity_list_lines(entities: &[ResolvedEntity], width: usize) -> Vec<String> {
    let mut lines = vec![format!("Companies to archive ({}):", entities.len())];
    lines.extend(entities.iter().map(|resolved| {
        let entity = resolved.entity();
        let line = if !resolved.is_ready() {
            format!("  {}  (name lookup failed, will be skipped)", entity.id)
        } else if entity.display_name == entity.id.as_str() {
            format!("  {}  (name unavailable)", entity.id)
        } else {
            format!("  {}  {}", entity.id, entity.display_name)
        };
        truncate_to_width(&line, width)
    }));
    lines
}

pub fn print_entity_list(entities: &[ResolvedEntity]) {
    for line in entity_list_lines(entities, terminal_width()) {
        println!("{line}");
    }
}

fn status_label(summary: &EntitySummary) -> String {
    match &summary.outcome {
        EntityOutcome::Completed => "done".to_string(),
        EntityOutcome::Aborted { reason } => format!("aborted: {reason}"),
        EntityOutcome::Cancelled => "interrupted".to_string(),
    }
}

/// Summary table: one row per company plus totals.
pub fn summary_lines(summary: &RunSummary, width: usize) -> Vec<String> {
    let row = |name: &str, fetched: String, skipped: String, failed: String, status: &str| {
        let line = format!(
            "{:<name_width$} {fetched:>7} {skipped:>7} {failed:>6}  {status}",
            truncate_to_width(name, NAME_COLUMN),
            name_width = NAME_COLUMN
        );
        truncate_to_width(line.trim_end(), width)
    };

    let mut lines = vec![row(
        "Company",
        "fetched".into(),
        "skipped".into(),
        "failed".into(),
        "status",
    )];
    for entity in &summary.entities {
        lines.push(row(
            &entity.entity.display_name,
            entity.fetched.to_string(),
            entity.skipped.to_string(),
            entity.failed.to_string(),
            &status_label(entity),
        ));
    }
    lines.push(row(
        "Total",
        summary.total_fetched().to_string(),
        summary.total_skipped().to_string(),
        summary.total_failed().to_string(),
        "",
    ));
    if summary.cancelled {
        lines.push("Interrupted. Run again to resume.".to_string());
    }
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in summary_lines(summary, terminal_width()) {
        println!("{line}");
    }
}
