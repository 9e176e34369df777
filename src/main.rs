use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod catalog;
mod cli;
mod config;
mod dtype;
mod fixtures;
mod paths;
mod reconcile;
mod report;
mod tiff;
mod tree;
mod util;

use catalog::ToolCatalog;
use cli::{
    Command, FetchToolsArgs, GenerateArgs, ReportArgs, RootArgs, SummarizeInvocationArgs,
    SummarizeXunitArgs,
};
use paths::DataPaths;
use reconcile::xunit::XunitOutcome;
use reconcile::{reconcile, JobRecord};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Generate(args) => run_generate(args),
        Command::SummarizeInvocation(args) => run_summarize_invocation(args),
        Command::SummarizeXunit(args) => run_summarize_xunit(args),
        Command::FetchTools(args) => run_fetch_tools(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = match args.config.as_deref() {
        Some(path) => config::load_config(path)?,
        None => config::default_config(),
    };
    config::validate_config(&config)?;

    let paths = DataPaths::new(args.data_dir);
    fixtures::purge_stale_fixtures(&paths)?;
    let summary = fixtures::generate(&paths, &config)?;

    if args.json {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &summary)?;
        writeln!(stdout)?;
        return Ok(());
    }
    println!(
        "wrote {} fixtures from {} sample volumes",
        summary.fixtures_written, summary.sample_volumes
    );
    for path in summary.archives.iter().chain(&summary.delivery_zips) {
        println!("wrote {}", util::display_path(path, Some(paths.root())));
    }
    Ok(())
}

fn run_summarize_invocation(args: SummarizeInvocationArgs) -> Result<()> {
    let catalog = ToolCatalog::from_csv_path(&args.report.tools)?;
    let export = reconcile::invocation::read_invocation_archive(&args.archive)?;
    let jobs = reconcile::invocation::jobs_from_export(&export)?;
    emit_report(jobs, &catalog, &args.report)
}

fn run_summarize_xunit(args: SummarizeXunitArgs) -> Result<()> {
    let catalog = ToolCatalog::from_csv_path(&args.report.tools)?;
    match reconcile::xunit::read_xunit(&args.xunit)? {
        XunitOutcome::AllPassed => {
            println!("All tests passed.");
            Ok(())
        }
        XunitOutcome::Failed(jobs) => emit_report(jobs, &catalog, &args.report),
    }
}

fn emit_report(jobs: Vec<JobRecord>, catalog: &ToolCatalog, args: &ReportArgs) -> Result<()> {
    let report = reconcile(jobs, catalog);
    match args.csv.as_deref() {
        Some(dir) => {
            report::write_csv_report(dir, &report)?;
            Ok(())
        }
        None => report::write_json_report(io::stdout().lock(), &report),
    }
}

fn run_fetch_tools(args: FetchToolsArgs) -> Result<()> {
    let url = config::resolve_tools_url(args.url.as_deref());
    let paths = DataPaths::new(args.data_dir);
    let csv_path = paths.tools_csv_path();
    let catalog =
        catalog::refresh_catalog(&url, &paths.tools_json_path(), &csv_path, args.refresh)?;
    println!(
        "wrote {} tool ids to {}",
        catalog.len(),
        display_relative(&csv_path)
    );
    Ok(())
}

fn display_relative(path: &Path) -> String {
    let cwd = std::env::current_dir().ok();
    util::display_path(path, cwd.as_deref())
}
