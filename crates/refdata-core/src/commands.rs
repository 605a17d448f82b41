//! Command handlers. Each returns an [`ExecutionOutcome`]; ledger errors are
//! folded into user-error or failure outcomes here rather than bubbled up.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use refdata_domain::{render_manifest, Manifest};
use serde_json::json;
use tracing::debug;

use crate::errors::{manifest_error_outcome, missing_manifest_outcome, remote_prefix_outcome};
use crate::ledger::{ManifestReader, ManifestWriter};
use crate::store::BlobStore;
use crate::{CommandContext, ExecutionOutcome};

#[derive(Clone, Debug, Default)]
pub struct InitRequest;

#[derive(Clone, Debug)]
pub struct AddRequest {
    pub name: String,
    pub file: PathBuf,
    pub local_path: Option<String>,
    pub remote_path: Option<String>,
    pub notes: String,
}

#[derive(Clone, Debug)]
pub struct RemoveRequest {
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct SyncRequest {
    pub size_only: bool,
}

#[derive(Clone, Debug, Default)]
pub struct VerifyRequest {
    pub checksums: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ListRequest;

/// Writes a manifest holding only the header line.
pub fn manifest_init(ctx: &CommandContext, _request: &InitRequest) -> Result<ExecutionOutcome> {
    let path = ctx.manifest_path();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Ok(ExecutionOutcome::user_error(
                format!("manifest '{}' already exists", path.display()),
                json!({
                    "reason": "manifest_exists",
                    "manifest": path.display().to_string(),
                    "hint": "pass --manifest PATH to create a different manifest",
                }),
            ));
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to create {}", path.display()));
        }
    };
    let contents = render_manifest(&Manifest::new(path));
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(ExecutionOutcome::success(
        format!("created {}", path.display()),
        json!({ "manifest": path.display().to_string() }),
    ))
}

/// Tracks a file: uploads it unless an identical object already exists, then
/// records it.
pub fn manifest_add(ctx: &CommandContext, request: &AddRequest) -> Result<ExecutionOutcome> {
    let path = ctx.manifest_path();
    let store = match ledger_store(ctx) {
        Ok(store) => store,
        Err(outcome) => return Ok(outcome),
    };
    let local_path = match &request.local_path {
        Some(local_path) => local_path.clone(),
        None => match request.file.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => {
                return Ok(ExecutionOutcome::user_error(
                    format!(
                        "can not derive a local path from '{}'",
                        request.file.display()
                    ),
                    json!({
                        "reason": "invalid_local_path",
                        "hint": "pass --local-path REL",
                    }),
                ));
            }
        },
    };
    let remote_path = request.remote_path.clone().unwrap_or_else(|| local_path.clone());
    debug!(%local_path, %remote_path, "resolved add paths");
    let location = store.location(&remote_path);
    let mut writer = match ManifestWriter::open(path, store) {
        Ok(writer) => writer,
        Err(err) => return Ok(manifest_error_outcome(&err)),
    };
    match writer.add_file(
        &request.name,
        &request.file,
        &local_path,
        &remote_path,
        &request.notes,
    ) {
        Ok(record) => Ok(ExecutionOutcome::success(
            format!("added {} ({} bytes)", record.name, record.size),
            json!({
                "record": record,
                "location": location,
                "manifest": path.display().to_string(),
            }),
        )),
        Err(err) => Ok(manifest_error_outcome(&err)),
    }
}

/// Drops a record; the local copy and remote object stay where they are.
pub fn manifest_remove(ctx: &CommandContext, request: &RemoveRequest) -> Result<ExecutionOutcome> {
    let path = ctx.manifest_path();
    let store = match ledger_store(ctx) {
        Ok(store) => store,
        Err(outcome) => return Ok(outcome),
    };
    let result =
        ManifestWriter::open(path, store).and_then(|mut writer| writer.remove_file(&request.name));
    match result {
        Ok(record) => Ok(ExecutionOutcome::success(
            format!("removed {}", record.name),
            json!({
                "record": record,
                "manifest": path.display().to_string(),
            }),
        )),
        Err(err) => Ok(manifest_error_outcome(&err)),
    }
}

pub fn manifest_sync(ctx: &CommandContext, request: &SyncRequest) -> Result<ExecutionOutcome> {
    let path = ctx.manifest_path();
    let store = match ledger_store(ctx) {
        Ok(store) => store,
        Err(outcome) => return Ok(outcome),
    };
    let local_prefix = ctx.local_prefix();
    let result = ManifestReader::open(path, store)
        .and_then(|reader| reader.sync_with(local_prefix, !request.size_only));
    match result {
        Ok(summary) => Ok(ExecutionOutcome::success(
            format!(
                "{} downloaded, {} already present",
                summary.downloaded.len(),
                summary.verified.len()
            ),
            json!({
                "downloaded": summary.downloaded,
                "verified": summary.verified,
                "checksums": !request.size_only,
                "local_prefix": local_prefix.display().to_string(),
            }),
        )),
        Err(err) => Ok(manifest_error_outcome(&err)),
    }
}

pub fn manifest_verify(ctx: &CommandContext, request: &VerifyRequest) -> Result<ExecutionOutcome> {
    let path = ctx.manifest_path();
    let store = match ledger_store(ctx) {
        Ok(store) => store,
        Err(outcome) => return Ok(outcome),
    };
    let local_prefix = ctx.local_prefix();
    let result = ManifestReader::open(path, store)
        .and_then(|reader| reader.verify(local_prefix, request.checksums));
    match result {
        Ok(summary) => {
            let checked = if summary.checksums {
                "sizes and checksums"
            } else {
                "sizes"
            };
            Ok(ExecutionOutcome::success(
                format!("{} files match ({checked})", summary.verified),
                json!({
                    "verified": summary.verified,
                    "checksums": summary.checksums,
                    "local_prefix": local_prefix.display().to_string(),
                }),
            ))
        }
        Err(err) => Ok(manifest_error_outcome(&err)),
    }
}

pub fn manifest_list(ctx: &CommandContext, _request: &ListRequest) -> Result<ExecutionOutcome> {
    let path = ctx.manifest_path();
    let store = match ledger_store(ctx) {
        Ok(store) => store,
        Err(outcome) => return Ok(outcome),
    };
    let reader = match ManifestReader::open(path, store) {
        Ok(reader) => reader.with_local_prefix(ctx.local_prefix()),
        Err(err) => return Ok(manifest_error_outcome(&err)),
    };
    let records: Vec<_> = reader
        .records()
        .map(|record| {
            json!({
                "name": record.name,
                "local_path": record.local_path,
                "remote_path": record.remote_path,
                "md5sum": record.md5sum,
                "size": record.size,
                "notes": record.notes,
                "location": reader.store().location(&record.remote_path),
                "local": reader.local_prefix().join(&record.local_path).display().to_string(),
            })
        })
        .collect();
    Ok(ExecutionOutcome::success(
        format!("{} records", records.len()),
        json!({
            "records": records,
            "manifest": path.display().to_string(),
        }),
    ))
}

/// Store for the configured prefix, once the manifest is known to exist.
fn ledger_store(ctx: &CommandContext) -> Result<Arc<dyn BlobStore>, ExecutionOutcome> {
    let path = ctx.manifest_path();
    if !path.exists() {
        return Err(missing_manifest_outcome(path));
    }
    ctx.store()
        .map_err(|err| remote_prefix_outcome(ctx.config().remote_prefix(), &err))
}
