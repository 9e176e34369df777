//! CLI argument parsing for fixture generation and result summaries.
//!
//! Each subcommand maps onto one pipeline; no policy lives here.
use crate::paths::DEFAULT_DATA_DIR;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default flattened tool catalog, relative to the working directory.
pub const DEFAULT_TOOLS_CSV: &str = "data/tools.csv";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "testkit",
    version,
    about = "Synthetic TIFF fixtures and coverage reports for imaging tool tests",
    after_help = "Examples:\n  testkit generate --data-dir data\n  testkit fetch-tools --data-dir data\n  testkit summarize-invocation invocation.tgz --csv report/\n  testkit summarize-xunit results.xml",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    SummarizeInvocation(SummarizeInvocationArgs),
    SummarizeXunit(SummarizeXunitArgs),
    FetchTools(FetchToolsArgs),
}

/// Generate command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write TIFF fixtures, multi-series archives and delivery zips")]
pub struct GenerateArgs {
    /// Output root; fixtures land under images/tiff/<target>/
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// JSON generation config; defaults apply to omitted fields
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit the generation summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Tar-based result summary inputs.
#[derive(Parser, Debug)]
#[command(about = "Summarize a workflow invocation export against the tool catalog")]
pub struct SummarizeInvocationArgs {
    /// Invocation export archive (tar, optionally gzip-compressed)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// XUnit result summary inputs.
#[derive(Parser, Debug)]
#[command(about = "Summarize an XUnit workflow test report against the tool catalog")]
pub struct SummarizeXunitArgs {
    /// XUnit XML file produced by the workflow run
    #[arg(value_name = "XUNIT")]
    pub xunit: PathBuf,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// Options shared by both summaries.
#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Flattened tool catalog CSV
    #[arg(long, value_name = "PATH", default_value = DEFAULT_TOOLS_CSV)]
    pub tools: PathBuf,

    /// Write CSV tables to this directory instead of JSON to stdout
    #[arg(long, value_name = "DIR")]
    pub csv: Option<PathBuf>,
}

/// Registry download inputs.
#[derive(Parser, Debug)]
#[command(about = "Download the tool registry and flatten it to tools.csv")]
pub struct FetchToolsArgs {
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Download again even if tools.json is cached
    #[arg(long)]
    pub refresh: bool,

    /// Registry URL (overrides TESTKIT_TOOLS_URL)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_share_report_options() {
        let args = RootArgs::try_parse_from([
            "testkit",
            "summarize-xunit",
            "run.xml",
            "--csv",
            "out",
            "--tools",
            "catalog.csv",
        ])
        .expect("parse");
        let Command::SummarizeXunit(xunit) = args.command else {
            panic!("expected summarize-xunit");
        };
        assert_eq!(xunit.xunit, PathBuf::from("run.xml"));
        assert_eq!(xunit.report.csv, Some(PathBuf::from("out")));
        assert_eq!(xunit.report.tools, PathBuf::from("catalog.csv"));
    }

    #[test]
    fn defaults_point_into_data_dir() {
        let args = RootArgs::try_parse_from(["testkit", "summarize-invocation", "inv.tar"])
            .expect("parse");
        let Command::SummarizeInvocation(inv) = args.command else {
            panic!("expected summarize-invocation");
        };
        assert_eq!(inv.report.tools, PathBuf::from(DEFAULT_TOOLS_CSV));
        assert_eq!(inv.report.csv, None);

        let args = RootArgs::try_parse_from(["testkit", "generate", "--verbose"]).expect("parse");
        assert!(args.verbose);
        let Command::Generate(generate) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(generate.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn summaries_require_an_input_path() {
        assert!(RootArgs::try_parse_from(["testkit", "summarize-xunit"]).is_err());
    }
}
