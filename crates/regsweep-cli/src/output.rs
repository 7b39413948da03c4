use atty::Stream;
use color_eyre::Result;
use regsweep_core::{
    format_bytes, total_row, usage_rows, DeletionStatus, ExecutionOutcome, SweepSummary, UsageRow,
};
use serde_json::json;

use crate::style::Style;

const HEADERS: [&str; 5] = ["Repository", "Total", "Linked", "Detached", "Linked %"];

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

pub fn emit_output(
    opts: &OutputOptions,
    summary: &SweepSummary,
    outcome: &ExecutionOutcome,
) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));

    if opts.json {
        let payload = json!({
            "status": outcome.status,
            "message": outcome.message,
            "details": outcome.details,
            "code": code,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }
    if opts.quiet {
        return Ok(code);
    }

    let usage = &summary.reconciliation.usage;
    if usage.is_empty() {
        println!("{}", style.info("no blobs found in storage"));
    } else {
        println!("{}", format_usage_table(&style, &usage_rows(usage), &total_row(usage)));
    }
    if summary.reconciliation.unsized_blobs > 0 {
        let line = format!(
            "{} blobs have no known size and are left out of the totals",
            summary.reconciliation.unsized_blobs
        );
        println!("{}", style.info(&line));
    }
    for failure in summary.references.failures() {
        let line = format!("warning: {}: {}", failure.scope, failure.message);
        println!("{}", style.warning(&line));
    }
    for record in &summary.deletion.records {
        match &record.status {
            DeletionStatus::Failed { error } => {
                let line = format!("warning: {} ({}): {error}", record.digest, record.repository);
                println!("{}", style.warning(&line));
            }
            DeletionStatus::Unverified { remaining } => {
                let line = format!(
                    "warning: {} ({}): {} paths remain after removal",
                    record.digest,
                    record.repository,
                    remaining.len()
                );
                println!("{}", style.warning(&line));
            }
            DeletionStatus::Planned | DeletionStatus::Verified => {}
        }
    }
    let deletion = &summary.deletion;
    if !deletion.records.is_empty() {
        let line = format!(
            "deletions: {} planned ({}), {} verified ({} reclaimed), {} unverified, {} failed",
            deletion.planned(),
            format_bytes(deletion.planned_bytes()),
            deletion.verified(),
            format_bytes(deletion.reclaimed_bytes()),
            deletion.unverified(),
            deletion.failed()
        );
        println!("{}", style.info(&line));
    }
    println!("{}", style.status(outcome.status, &outcome.message));

    Ok(code)
}

fn cells(row: &UsageRow) -> [String; 5] {
    [
        row.repository
            .as_ref()
            .map_or_else(|| "TOTAL".to_string(), ToString::to_string),
        format_bytes(row.total_size),
        format_bytes(row.linked_size),
        format_bytes(row.detached_size),
        format!("{:.1}%", row.linked_percent),
    ]
}

fn format_usage_table(style: &Style, rows: &[UsageRow], total: &UsageRow) -> String {
    let body: Vec<[String; 5]> = rows.iter().map(cells).collect();
    let footer = cells(total);

    let mut widths = HEADERS.map(str::len);
    for row in body.iter().chain(std::iter::once(&footer)) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |values: [&str; 5]| {
        format!(
            "{:<w0$}  {:>w1$}  {:>w2$}  {:>w3$}  {:>w4$}",
            values[0],
            values[1],
            values[2],
            values[3],
            values[4],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
            w4 = widths[4],
        )
    };
    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join("  ");

    let mut lines = vec![style.table_header(&line(HEADERS)), rule.clone()];
    for row in &body {
        lines.push(line(row.each_ref().map(String::as_str)));
    }
    lines.push(rule);
    lines.push(line(footer.each_ref().map(String::as_str)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsweep_core::UsageTable;

    #[test]
    fn table_lists_rows_then_total() {
        let mut usage = UsageTable::default();
        usage.accumulate(&"repoX".into(), 100, true);
        usage.accumulate(&"repoX".into(), 50, false);
        usage.accumulate(&"repoY".into(), 200, false);

        let table = format_usage_table(
            &Style::new(true, false),
            &usage_rows(&usage),
            &total_row(&usage),
        );
        let lines: Vec<_> = table.lines().collect();

        assert!(lines[0].starts_with("Repository"));
        assert!(lines[2].starts_with("repoY"));
        assert!(lines[2].ends_with("0.0%"));
        assert!(lines[3].starts_with("repoX"));
        assert!(lines[3].ends_with("66.7%"));
        assert!(lines[5].starts_with("TOTAL"));
        assert!(lines[5].contains("350 B"));
    }
}
