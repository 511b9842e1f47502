mod centralizer;
mod commands;
mod config;
mod diagnostics;
mod edits;
mod error;
mod extractor;
mod fixer;
mod index;
mod internalizer;
mod manifest;
mod markup;
mod paths;
mod relocator;
mod report;
mod scanner;
mod solution;
mod types;
mod variables;
mod versions;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Options;

#[derive(Parser)]
#[command(
    name = "dotnet-refs",
    version,
    about = "Keep .sln and .csproj references consistent with where projects actually are"
)]
struct Cli {
    /// fix-references, relocate-topology, internalize-packages, centralize-versions (or legacy fix)
    mode: String,
    /// Directory, .sln or .slnf to start from, relative to the working directory
    #[arg(short = 'e', long, visible_alias = "ep")]
    entry_point: Option<PathBuf>,
    /// Remove attribute-less ItemGroups left empty after internalizing packages
    #[arg(long, visible_alias = "reig")]
    remove_empty_item_groups: bool,
    /// Delete project files the relocation topology never reaches
    #[arg(long, visible_alias = "rupf")]
    remove_unreferenced_project_files: bool,
    /// Log progress to stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
    /// Root of the tree to operate on [default: current directory]
    #[arg(short = 'w', long, visible_alias = "wd")]
    working_directory: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = Options {
        entry_point: cli.entry_point,
        remove_empty_item_groups: cli.remove_empty_item_groups,
        remove_unreferenced_project_files: cli.remove_unreferenced_project_files,
        working_directory: cli.working_directory,
    };

    match commands::run(&cli.mode, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "run failed");
            diagnostics::print_error(&e);
            ExitCode::from(e.exit_code())
        },
    }
}

/// Install the stderr subscriber: `RUST_LOG` if set, else `warn` (or `debug` with `-v`).
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
