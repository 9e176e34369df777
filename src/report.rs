//! Coverage report output: JSON on a writer, or a directory of CSV tables.
use crate::reconcile::CoverageReport;
use crate::util::publish_bytes;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const OVERVIEW_FILE: &str = "overview.csv";

const OVERVIEW_HEADER: [&str; 5] = [
    "Tested Tools",
    "Success Rate",
    "",
    "Untested Tools",
    "Spuriously Tested Tools",
];

pub fn write_json_report<W: Write>(mut writer: W, report: &CoverageReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report).context("serialize coverage report")?;
    writeln!(writer).context("write coverage report")?;
    Ok(())
}

/// Write `overview.csv` plus one `<suite>/<tool>.csv` per tested tool.
///
/// Returns the written paths in write order.
pub fn write_csv_report(dir: &Path, report: &CoverageReport) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let overview_path = dir.join(OVERVIEW_FILE);
    publish_bytes(&overview_path, &overview_csv(report)?)?;
    written.push(overview_path);

    for tool_id in report.tested_tools() {
        let path = dir.join(format!("{tool_id}.csv"));
        publish_bytes(&path, &tool_csv(report, tool_id)?)?;
        written.push(path);
    }
    tracing::info!(files = written.len(), dir = %dir.display(), "wrote CSV report");
    Ok(written)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| anyhow!("flush CSV: {}", err.error()))
}

/// Columns are independent lists; shorter ones are padded with empty cells.
fn overview_csv(report: &CoverageReport) -> Result<Vec<u8>> {
    let tested: Vec<&String> = report.tested_tools().collect();
    let untested: Vec<&String> = report.untested_tools.iter().collect();
    let spurious: Vec<&String> = report.spuriously_tested_tools.iter().collect();
    let rows = tested.len().max(untested.len()).max(spurious.len());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(OVERVIEW_HEADER)
        .context("write overview header")?;
    for row in 0..rows {
        let rate = tested
            .get(row)
            .and_then(|tool_id| report.success_rate(tool_id))
            .map(|rate| format!("{rate:?}"))
            .unwrap_or_default();
        writer
            .write_record([
                cell(&tested, row),
                rate.as_str(),
                "",
                cell(&untested, row),
                cell(&spurious, row),
            ])
            .context("write overview row")?;
    }
    finish_csv(writer)
}

fn cell<'a>(column: &[&'a String], row: usize) -> &'a str {
    column.get(row).map(|id| id.as_str()).unwrap_or_default()
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn tool_csv(report: &CoverageReport, tool_id: &str) -> Result<Vec<u8>> {
    let outcomes = report.details.get(tool_id).map(Vec::as_slice).unwrap_or_default();
    let input_names: BTreeSet<&str> = outcomes
        .iter()
        .flat_map(|outcome| outcome.inputs.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header: Vec<String> = input_names
        .iter()
        .map(|name| format!("Inputs/{name}"))
        .collect();
    header.push("State".to_string());
    header.push("Success".to_string());
    writer
        .write_record(&header)
        .with_context(|| format!("write {tool_id} header"))?;

    for outcome in outcomes {
        let mut row: Vec<&str> = input_names
            .iter()
            .map(|name| outcome.inputs.get(*name).map(String::as_str).unwrap_or_default())
            .collect();
        row.push(&outcome.state);
        row.push(python_bool(outcome.success));
        writer
            .write_record(&row)
            .with_context(|| format!("write {tool_id} row"))?;
    }
    finish_csv(writer)
}
