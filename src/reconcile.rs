//! Result reconciliation: which catalog tools a test run actually exercised.
//!
//! Both result inputs (tar invocation exports and XUnit reports) are normalized
//! into [`JobRecord`]s first; [`reconcile`] then partitions tool identifiers
//! against the [`ToolCatalog`].
pub mod invocation;
pub mod xunit;

use crate::catalog::ToolCatalog;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Fixture plumbing that unpacks the delivery zip; never a tool under test.
pub const AUXILIARY_TOOL: &str = "unzip/unzip";

/// Job state that counts as success.
pub const STATE_OK: &str = "ok";

/// Structured tool-shed identifier: `source/repos/owner/suite/name/version`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolId {
    pub source: String,
    pub owner: String,
    pub suite: String,
    pub name: String,
    pub version: String,
}

impl ToolId {
    /// Parse a full tool-shed identifier; built-in tools without a suite and
    /// name segment yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<&str> = raw.trim().split('/').collect();
        if segments.len() < 5 {
            return None;
        }
        let suite = segments[3];
        let name = segments[4];
        if suite.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            source: segments[0].to_string(),
            owner: segments[2].to_string(),
            suite: suite.to_string(),
            name: name.to_string(),
            version: segments[5..].join("/"),
        })
    }

    /// `suite/name`, the form the catalog uses.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.suite, self.name)
    }

    pub fn is_auxiliary(&self) -> bool {
        self.qualified() == AUXILIARY_TOOL
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.suite, self.name)
    }
}

/// One job normalized from either result input, inputs already resolved to
/// file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub tool: ToolId,
    pub state: String,
    pub inputs: BTreeMap<String, String>,
}

/// One run of a tool: success flag plus the fixture files it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub success: bool,
    pub state: String,
    pub inputs: BTreeMap<String, String>,
}

/// Three-way partition of tool identifiers plus per-tool outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub expectedly_tested_tools: BTreeSet<String>,
    pub untested_tools: BTreeSet<String>,
    pub spuriously_tested_tools: BTreeSet<String>,
    pub details: BTreeMap<String, Vec<TestOutcome>>,
}

impl CoverageReport {
    /// Every tool with at least one outcome, expected or not.
    pub fn tested_tools(&self) -> impl Iterator<Item = &String> {
        self.details.keys()
    }

    /// Fraction of successful runs for a tool.
    pub fn success_rate(&self, tool_id: &str) -> Option<f64> {
        let outcomes = self.details.get(tool_id)?;
        if outcomes.is_empty() {
            return None;
        }
        let successes = outcomes.iter().filter(|outcome| outcome.success).count();
        Some(successes as f64 / outcomes.len() as f64)
    }
}

/// Partition observed jobs against the catalog.
///
/// Auxiliary jobs and jobs without any resolved input are left out of the
/// accounting entirely.
pub fn reconcile<I>(jobs: I, catalog: &ToolCatalog) -> CoverageReport
where
    I: IntoIterator<Item = JobRecord>,
{
    let mut untested: BTreeSet<String> = catalog.tool_ids().clone();
    let mut details: BTreeMap<String, Vec<TestOutcome>> = BTreeMap::new();
    for job in jobs {
        if job.tool.is_auxiliary() {
            continue;
        }
        let tool_id = job.tool.qualified();
        if job.inputs.is_empty() {
            tracing::debug!(tool = %tool_id, "job has no resolved inputs");
            continue;
        }
        tracing::debug!(
            tool = %tool_id,
            owner = %job.tool.owner,
            version = %job.tool.version,
            source = %job.tool.source,
            state = %job.state,
            "recorded test outcome"
        );
        untested.remove(&tool_id);
        details.entry(tool_id).or_default().push(TestOutcome {
            success: job.state == STATE_OK,
            state: job.state,
            inputs: job.inputs,
        });
    }

    let mut report = CoverageReport {
        untested_tools: untested,
        ..CoverageReport::default()
    };
    for tool_id in details.keys() {
        if catalog.contains(tool_id) {
            report.expectedly_tested_tools.insert(tool_id.clone());
        } else {
            report.spuriously_tested_tools.insert(tool_id.clone());
        }
    }
    report.details = details;
    tracing::info!(
        expected = report.expectedly_tested_tools.len(),
        untested = report.untested_tools.len(),
        spurious = report.spuriously_tested_tools.len(),
        "reconciled test results"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    fn catalog(ids: &[&str]) -> ToolCatalog {
        ToolCatalog::from_entries(ids.iter().map(|id| {
            let (suite, name) = id.split_once('/').expect("suite/name");
            CatalogEntry {
                suite_id: suite.to_string(),
                tool_names: vec![name.to_string()],
            }
        }))
    }

    fn job(qualified: &str, state: &str, inputs: &[(&str, &str)]) -> JobRecord {
        let raw = format!("toolshed.g2.bx.psu.edu/repos/imgteam/{qualified}/1.0");
        JobRecord {
            tool: ToolId::parse(&raw).expect("tool id"),
            state: state.to_string(),
            inputs: inputs
                .iter()
                .map(|(name, file)| (name.to_string(), file.to_string()))
                .collect(),
        }
    }

    #[test]
    fn tool_id_keeps_suite_and_name() {
        let id = ToolId::parse("toolshed.g2.bx.psu.edu/repos/imgteam/2d_simple_filter/ip_filter_standard/1.12.0+galaxy1")
            .expect("parse");
        assert_eq!(id.qualified(), "2d_simple_filter/ip_filter_standard");
        assert_eq!(id.owner, "imgteam");
        assert_eq!(id.version, "1.12.0+galaxy1");
        assert_eq!(ToolId::parse("upload1"), None);
        assert_eq!(ToolId::parse("__UNZIP_COLLECTION__"), None);
    }

    #[test]
    fn partition_against_catalog() {
        let report = reconcile(
            vec![
                job("s/a", "ok", &[("input", "uint8_y10_x11.tiff")]),
                job("s/c", "error", &[("input", "float32_y10_x11.tiff")]),
            ],
            &catalog(&["s/a", "s/b"]),
        );
        assert_eq!(report.expectedly_tested_tools, BTreeSet::from(["s/a".to_string()]));
        assert_eq!(report.untested_tools, BTreeSet::from(["s/b".to_string()]));
        assert_eq!(report.spuriously_tested_tools, BTreeSet::from(["s/c".to_string()]));
        assert!(!report.details["s/c"][0].success);
    }

    #[test]
    fn auxiliary_tool_never_classified() {
        let report = reconcile(
            vec![job("unzip/unzip", "ok", &[("input", "tiff-intensity-images.zip")])],
            &catalog(&["unzip/unzip", "s/a"]),
        );
        assert!(!report.expectedly_tested_tools.contains(AUXILIARY_TOOL));
        assert!(!report.spuriously_tested_tools.contains(AUXILIARY_TOOL));
        assert!(!report.details.contains_key(AUXILIARY_TOOL));
    }

    #[test]
    fn jobs_without_inputs_are_not_accounted() {
        let report = reconcile(vec![job("s/a", "ok", &[])], &catalog(&["s/a"]));
        assert!(report.untested_tools.contains("s/a"));
        assert!(report.details.is_empty());
    }

    #[test]
    fn repeated_runs_accumulate_outcomes() {
        let report = reconcile(
            vec![
                job("s/a", "ok", &[("input", "a.tiff")]),
                job("s/a", "error", &[("input", "b.tiff")]),
                job("s/a", "ok", &[("input", "c.tiff")]),
                job("s/a", "ok", &[("input", "d.tiff")]),
            ],
            &catalog(&["s/a"]),
        );
        assert_eq!(report.details["s/a"].len(), 4);
        assert_eq!(report.success_rate("s/a"), Some(0.75));
        assert_eq!(report.success_rate("s/missing"), None);
        assert!(report.untested_tools.is_empty());
    }
}
