use std::path::Path;

use refdata_domain::ManifestError;
use serde_json::{json, Value};

use crate::ExecutionOutcome;

/// Maps a ledger error onto the outcome the CLI reports.
#[must_use]
pub fn manifest_error_outcome(err: &ManifestError) -> ExecutionOutcome {
    let mut details = json!({
        "reason": err.reason(),
        "code": err.code(),
    });
    if let Value::Object(map) = &mut details {
        if let Some(hint) = hint_for(err) {
            map.insert("hint".into(), Value::String(hint.to_string()));
        }
        if let Some(context) = error_context(err) {
            map.extend(context);
        }
    }
    if err.is_user_error() {
        ExecutionOutcome::user_error(err.to_string(), details)
    } else {
        ExecutionOutcome::failure(err.to_string(), details)
    }
}

pub fn missing_manifest_outcome(path: &Path) -> ExecutionOutcome {
    ExecutionOutcome::user_error(
        format!("manifest '{}' not found", path.display()),
        json!({
            "reason": "missing_manifest",
            "manifest": path.display().to_string(),
            "hint": "run `refdata init` or pass --manifest PATH",
        }),
    )
}

pub fn remote_prefix_outcome(prefix: &str, err: &anyhow::Error) -> ExecutionOutcome {
    ExecutionOutcome::user_error(
        format!("can not use remote prefix '{prefix}': {err}"),
        json!({
            "reason": "invalid_remote_prefix",
            "remote_prefix": prefix,
            "hint": "use gs://bucket/dir/, file:///dir/ or a directory path",
        }),
    )
}

/// Outcome for an error without a more specific mapping.
pub fn internal_error_outcome(err: &anyhow::Error) -> ExecutionOutcome {
    let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
    ExecutionOutcome::failure(
        err.to_string(),
        json!({
            "reason": "internal_error",
            "error": err.to_string(),
            "issues": issues,
            "hint": "re-run with -vv for more detail",
        }),
    )
}

fn hint_for(err: &ManifestError) -> Option<&'static str> {
    match err {
        ManifestError::Parse { .. } | ManifestError::DuplicateKey { .. } => {
            Some("fix the manifest by hand: a header line, then one uniquely named record per line")
        }
        ManifestError::KeyAlreadyExists { .. } => {
            Some("choose another name or run `refdata remove NAME` first")
        }
        ManifestError::KeyNotFound { .. } => Some("run `refdata list` to see tracked names"),
        ManifestError::InvalidField { .. } => Some("values may not contain tabs or line breaks"),
        ManifestError::MissingFile { .. } => {
            Some("run `refdata sync` to download missing files, or check the path")
        }
        ManifestError::FileMismatch { .. } => {
            Some("delete the local copy and run `refdata sync` to fetch it again")
        }
        ManifestError::FileAlreadyExists { .. } => {
            Some("pass a different --remote-path; the existing object holds other content")
        }
        ManifestError::ConcurrentModification { .. } => {
            Some("another process updated the manifest; re-run the command")
        }
        ManifestError::Remote { .. } => {
            Some("check the remote prefix and credentials (REFDATA_GCS_TOKEN)")
        }
        ManifestError::Io { .. } | ManifestError::UploadInconsistent { .. } => None,
    }
}

fn error_context(err: &ManifestError) -> Option<serde_json::Map<String, Value>> {
    let value = match err {
        ManifestError::Parse { manifest, line, .. } => json!({
            "manifest": manifest.display().to_string(),
            "line": line,
        }),
        ManifestError::DuplicateKey {
            name,
            manifest,
            line,
        } => json!({
            "name": name,
            "manifest": manifest.display().to_string(),
            "line": line,
        }),
        ManifestError::KeyAlreadyExists { name, manifest }
        | ManifestError::KeyNotFound { name, manifest } => json!({
            "name": name,
            "manifest": manifest.display().to_string(),
        }),
        ManifestError::InvalidField { field, .. } => json!({ "field": field }),
        ManifestError::MissingFile { name, path } => json!({
            "name": name,
            "path": path.display().to_string(),
        }),
        ManifestError::FileMismatch {
            name,
            path,
            field,
            expected,
            actual,
        } => json!({
            "name": name,
            "path": path.display().to_string(),
            "field": field,
            "expected": expected,
            "actual": actual,
        }),
        ManifestError::FileAlreadyExists {
            location,
            field,
            remote,
            local,
        } => json!({
            "location": location,
            "field": field,
            "remote": remote,
            "local": local,
        }),
        ManifestError::Remote { location, source } => json!({
            "location": location,
            "error": source.to_string(),
        }),
        ManifestError::UploadInconsistent { location, detail } => json!({
            "location": location,
            "error": detail,
        }),
        ManifestError::ConcurrentModification { manifest, .. } => json!({
            "manifest": manifest.display().to_string(),
        }),
        ManifestError::Io { path, source } => json!({
            "path": path.display().to_string(),
            "error": source.to_string(),
        }),
    };
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
