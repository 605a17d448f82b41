#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use clap::Parser;
use color_eyre::Result;
use refdata_core::{CommandContext, GlobalOptions};

mod cli;
mod dispatch;
mod output;
mod style;

pub use cli::*;
use dispatch::dispatch_command;
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = RefdataCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        manifest: cli.manifest.as_ref().map(|p| p.to_string_lossy().to_string()),
        remote_prefix: cli.remote_prefix.clone(),
        local_prefix: cli
            .local_prefix
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
    };
    let output = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };

    let (command, outcome) = match CommandContext::new(&global) {
        Ok(ctx) => dispatch_command(&ctx, &cli.command),
        Err(err) => dispatch::config_error(&cli.command, &err),
    };
    let code = emit_output(&output, command, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("refdata_core={level},refdata_cli={level},refdata={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
