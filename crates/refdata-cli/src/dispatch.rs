use refdata_core::{
    internal_error_outcome, manifest_add, manifest_init, manifest_list, manifest_remove,
    manifest_sync, manifest_verify, AddRequest, CommandContext, CommandGroup, ExecutionOutcome,
    InitRequest, ListRequest, RemoveRequest, SyncRequest, VerifyRequest,
};
use serde_json::json;

use crate::{AddArgs, CommandGroupCli};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> (CommandGroup, ExecutionOutcome) {
    let command = command_group(group);
    let outcome = match group {
        CommandGroupCli::Init => core_call(|| manifest_init(ctx, &InitRequest)),
        CommandGroupCli::Add(args) => {
            let request = add_request_from_args(args);
            core_call(|| manifest_add(ctx, &request))
        }
        CommandGroupCli::Remove(args) => {
            let request = RemoveRequest {
                name: args.name.clone(),
            };
            core_call(|| manifest_remove(ctx, &request))
        }
        CommandGroupCli::Sync(args) => {
            let request = SyncRequest {
                size_only: args.size_only,
            };
            core_call(|| manifest_sync(ctx, &request))
        }
        CommandGroupCli::Verify(args) => {
            let request = VerifyRequest {
                checksums: args.checksums,
            };
            core_call(|| manifest_verify(ctx, &request))
        }
        CommandGroupCli::List => core_call(|| manifest_list(ctx, &ListRequest)),
    };
    (command, outcome)
}

/// Outcome for a configuration that could not be resolved.
pub fn config_error(
    group: &CommandGroupCli,
    err: &anyhow::Error,
) -> (CommandGroup, ExecutionOutcome) {
    let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
    let outcome = ExecutionOutcome::user_error(
        err.to_string(),
        json!({
            "reason": "invalid_config",
            "issues": issues,
            "hint": "check --config / REFDATA_CONFIG and the REFDATA_* environment variables",
        }),
    );
    (command_group(group), outcome)
}

fn command_group(group: &CommandGroupCli) -> CommandGroup {
    match group {
        CommandGroupCli::Init => CommandGroup::Init,
        CommandGroupCli::Add(_) => CommandGroup::Add,
        CommandGroupCli::Remove(_) => CommandGroup::Remove,
        CommandGroupCli::Sync(_) => CommandGroup::Sync,
        CommandGroupCli::Verify(_) => CommandGroup::Verify,
        CommandGroupCli::List => CommandGroup::List,
    }
}

fn core_call<F>(action: F) -> ExecutionOutcome
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Some(manifest_err) = err.downcast_ref::<refdata_core::ManifestError>() {
                refdata_core::manifest_error_outcome(manifest_err)
            } else {
                internal_error_outcome(&err)
            }
        }
    }
}

fn add_request_from_args(args: &AddArgs) -> AddRequest {
    AddRequest {
        name: args.name.clone(),
        file: args.file.clone(),
        local_path: args.local_path.clone(),
        remote_path: args.remote_path.clone(),
        notes: args.notes.clone(),
    }
}
