use atty::Stream;
use color_eyre::Result;
use refdata_core::{status_line, CommandGroup, CommandStatus, ExecutionOutcome};
use serde_json::Value;

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

pub fn emit_output(
    opts: &OutputOptions,
    command: CommandGroup,
    outcome: &ExecutionOutcome,
) -> Result<i32> {
    let code = outcome.exit_code();

    if opts.json {
        let payload = outcome.to_json(command);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    if let CommandStatus::Ok = outcome.status {
        if opts.quiet {
            return Ok(code);
        }
        let style = Style::new(opts.no_color, atty::is(Stream::Stdout));
        let message = status_line(command, &outcome.message);
        println!("{}", style.status(outcome.status, &message));
        if let Some(table) = render_record_table(&style, command, &outcome.details) {
            println!("{table}");
        }
        if let Some(hint) = hint_from_details(&outcome.details) {
            println!("{}", style.hint(hint));
        }
    } else {
        let style = Style::new(opts.no_color, atty::is(Stream::Stderr));
        let header = status_line(command, &outcome.message);
        eprintln!("{}", style.error_header(&header));
        eprintln!();
        eprintln!("Why:");
        for reason in collect_why_bullets(&outcome.details, &outcome.message) {
            eprintln!("  • {reason}");
        }
        let fixes = collect_fix_bullets(&outcome.details);
        if !fixes.is_empty() {
            eprintln!();
            eprintln!("Fix:");
            for fix in fixes {
                eprintln!("{}", style.fix_bullet(&fix));
            }
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn render_record_table(style: &Style, command: CommandGroup, details: &Value) -> Option<String> {
    if command != CommandGroup::List {
        return None;
    }
    let records = details.get("records")?.as_array()?;
    if records.is_empty() {
        return None;
    }

    let mut rows = Vec::new();
    for record in records {
        let obj = record.as_object()?;
        rows.push(RecordRow {
            name: obj.get("name")?.as_str()?.to_string(),
            size: obj.get("size")?.as_u64()?.to_string(),
            local: obj.get("local_path")?.as_str()?.to_string(),
            remote: obj.get("location")?.as_str()?.to_string(),
        });
    }

    Some(format_record_table(style, &rows))
}

struct RecordRow {
    name: String,
    size: String,
    local: String,
    remote: String,
}

fn format_record_table(style: &Style, rows: &[RecordRow]) -> String {
    let headers = ["Name", "Size", "Local path", "Remote"];
    let mut widths = headers.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.name.len());
        widths[1] = widths[1].max(row.size.len());
        widths[2] = widths[2].max(row.local.len());
        widths[3] = widths[3].max(row.remote.len());
    }

    let line = |cells: [&str; 4]| {
        format!(
            "{:<w0$}  {:>w1$}  {:<w2$}  {:<w3$}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        )
        .trim_end()
        .to_string()
    };

    let mut lines = vec![style.table_header(&line(headers))];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(line([
            row.name.as_str(),
            row.size.as_str(),
            row.local.as_str(),
            row.remote.as_str(),
        ]));
    }
    lines.join("\n")
}

fn collect_why_bullets(details: &Value, fallback: &str) -> Vec<String> {
    let mut bullets = Vec::new();
    if let Some(reason) = details.get("reason").and_then(Value::as_str) {
        if let Some(display) = reason_display(reason) {
            push_unique(&mut bullets, display);
        }
    }
    if let Some(issues) = details.get("issues").and_then(Value::as_array) {
        for issue in issues.iter().filter_map(Value::as_str) {
            push_unique(&mut bullets, issue);
        }
    }
    if let Some(error) = details.get("error").and_then(Value::as_str) {
        push_unique(&mut bullets, error);
    }
    if bullets.is_empty() {
        bullets.push(fallback.to_string());
    }
    bullets
}

fn collect_fix_bullets(details: &Value) -> Vec<String> {
    let mut fixes = Vec::new();
    if let Some(hint) = hint_from_details(details) {
        push_unique(&mut fixes, hint);
    }
    if fixes.is_empty() {
        fixes.push("Re-run with --help for usage or -vv for more detail.".to_string());
    }
    fixes
}

fn push_unique(vec: &mut Vec<String>, text: impl Into<String>) {
    let entry = text.into();
    if entry.trim().is_empty() {
        return;
    }
    if !vec.iter().any(|existing| existing == &entry) {
        vec.push(entry);
    }
}

fn reason_display(code: &str) -> Option<&'static str> {
    match code {
        "missing_file" => Some("A tracked file is missing locally."),
        "file_mismatch" => Some("A local file differs from what the manifest records."),
        "remote_conflict" => Some("The remote object already exists with different content."),
        "concurrent_modification" => {
            Some("The manifest changed on disk after it was read; nothing was written.")
        }
        "key_exists" => Some("A record with this name already exists."),
        "key_not_found" => Some("No record has this name."),
        "invalid_manifest" | "duplicate_key" => Some("The manifest file could not be parsed."),
        "remote_error" => Some("The remote store request failed."),
        _ => None,
    }
}
