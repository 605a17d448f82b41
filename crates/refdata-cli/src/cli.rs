use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

pub const REFDATA_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const REFDATA_BEFORE_HELP: &str = concat!(
    "refdata ",
    env!("CARGO_PKG_VERSION"),
    " – Reference-data manifest tracker\n\n",
    "\x1b[1;36mLedger\x1b[0m\n",
    "  init             Create an empty manifest (header line only).\n",
    "  add / remove     Track a file (uploading it once) or drop a record.\n",
    "  list             Show tracked records.\n\n",
    "\x1b[1;36mLocal copies\x1b[0m\n",
    "  sync             Download missing files; check the ones already present.\n",
    "  verify           Check local files against recorded sizes (and checksums).\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "refdata",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = REFDATA_BEFORE_HELP,
    help_template = REFDATA_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct RefdataCli {
    #[arg(short, long, help = "Suppress human output", global = true)]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(long, value_name = "PATH", help = "TOML config file", global = true)]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Manifest file (default: data-manifest.tsv)",
        global = true
    )]
    pub manifest: Option<PathBuf>,
    #[arg(
        long,
        value_name = "URI",
        help = "Remote prefix: gs://bucket/dir/, file:///dir/ or a directory",
        global = true
    )]
    pub remote_prefix: Option<String>,
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory local paths resolve against",
        global = true
    )]
    pub local_prefix: Option<PathBuf>,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        about = "Create an empty manifest containing only the header.",
        override_usage = "refdata init [--manifest PATH]"
    )]
    Init,
    #[command(
        about = "Track a file: upload it unless an identical object exists, then record it.",
        override_usage = "refdata add <NAME> <FILE> [--local-path REL] [--remote-path REL] [--notes TEXT]"
    )]
    Add(AddArgs),
    #[command(
        about = "Drop a record. Local and remote copies are left alone.",
        override_usage = "refdata remove <NAME>"
    )]
    Remove(RemoveArgs),
    #[command(
        about = "Download missing files and check the ones already present.",
        override_usage = "refdata sync [--size-only]"
    )]
    Sync(SyncArgs),
    #[command(
        about = "Check local files against the manifest.",
        override_usage = "refdata verify [--checksums]"
    )]
    Verify(VerifyArgs),
    #[command(about = "List tracked records.", override_usage = "refdata list")]
    List,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct AddArgs {
    #[arg(value_name = "NAME", help = "Unique record name")]
    pub name: String,
    #[arg(value_name = "FILE", help = "File to track")]
    pub file: PathBuf,
    #[arg(
        long,
        value_name = "REL",
        help = "Path below the local prefix (default: the file name)"
    )]
    pub local_path: Option<String>,
    #[arg(
        long,
        value_name = "REL",
        help = "Path below the remote prefix (default: the local path)"
    )]
    pub remote_path: Option<String>,
    #[arg(long, value_name = "TEXT", default_value = "", help = "Free-form notes")]
    pub notes: String,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct RemoveArgs {
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct SyncArgs {
    #[arg(long, help = "Only compare sizes of files already present")]
    pub size_only: bool,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct VerifyArgs {
    #[arg(long, help = "Also compare MD5 checksums (reads every file)")]
    pub checksums: bool,
}
