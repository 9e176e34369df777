//! XML-based results: an XUnit report from a workflow test run.
//!
//! A passing run carries no `error` element. A failing one embeds the
//! invocation as JSON in the error text; fixture file names are recovered from
//! the output keys of the unzip step.
use super::{JobRecord, ToolId, AUXILIARY_TOOL};
use crate::tree::{find_tool, id_key};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// JSON pointer to the per-step job listing inside the error payload.
pub const STEPS_POINTER: &str = "/invocation_details/steps";

const UNZIP_OUTPUT_PATTERN: &str = r"^.+\|data_images_tiff_(.+)__$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XunitOutcome {
    /// The testcase has no error element; nothing to classify.
    AllPassed,
    /// Jobs recovered from the error payload.
    Failed(Vec<JobRecord>),
}

pub fn read_xunit(path: &Path) -> Result<XunitOutcome> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_xunit(&text).with_context(|| format!("parse {}", path.display()))
}

pub fn parse_xunit(text: &str) -> Result<XunitOutcome> {
    let document = roxmltree::Document::parse(text).context("parse XUnit XML")?;
    let testcase = document
        .root_element()
        .children()
        .find(|node| node.is_element())
        .ok_or_else(|| anyhow!("XUnit root element has no testcase child"))?;
    let Some(error) = testcase
        .children()
        .find(|node| node.has_tag_name("error"))
    else {
        return Ok(XunitOutcome::AllPassed);
    };

    let payload: Value = serde_json::from_str(error.text().unwrap_or_default())
        .context("parse error payload as JSON")?;
    let steps = payload
        .pointer(STEPS_POINTER)
        .ok_or_else(|| anyhow!("error payload has no invocation_details.steps"))?;
    jobs_from_steps(steps).map(XunitOutcome::Failed)
}

/// Map dataset ids to fixture file names from the unzip step outputs.
pub fn filenames_from_unzip_outputs(steps: &Value) -> Result<BTreeMap<String, String>> {
    let pattern = Regex::new(UNZIP_OUTPUT_PATTERN).expect("regex for unzip output keys");
    let mut filenames = BTreeMap::new();
    for unzip in find_tool(steps, AUXILIARY_TOOL) {
        let outputs = unzip
            .get("outputs")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("unzip step has no outputs mapping"))?;
        for (key, output) in outputs {
            let captures = pattern
                .captures(key)
                .ok_or_else(|| anyhow!("unzip output {key:?} does not name a fixture file"))?;
            let Some(id) = output.get("id").and_then(id_key) else {
                continue;
            };
            filenames.insert(id, captures[1].to_string());
        }
    }
    Ok(filenames)
}

fn step_list(steps: &Value) -> Result<Vec<&Value>> {
    match steps {
        Value::Object(map) => Ok(map.values().collect()),
        Value::Array(items) => Ok(items.iter().collect()),
        _ => Err(anyhow!("invocation steps must be a mapping or a sequence")),
    }
}

/// Normalize every job of every step into records with resolved inputs.
pub fn jobs_from_steps(steps: &Value) -> Result<Vec<JobRecord>> {
    let filenames = filenames_from_unzip_outputs(steps)?;
    let mut records = Vec::new();
    for step in step_list(steps)? {
        let Some(jobs) = step.get("jobs").and_then(Value::as_array) else {
            continue;
        };
        for job in jobs {
            let Some(raw_tool) = job.get("tool_id").and_then(Value::as_str) else {
                continue;
            };
            let Some(tool) = ToolId::parse(raw_tool) else {
                tracing::debug!(tool_id = raw_tool, "skipping job of a built-in tool");
                continue;
            };
            let state = job
                .get("state")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("job of {raw_tool} has no state"))?;

            let mut inputs = BTreeMap::new();
            if let Some(listed) = job.get("inputs").and_then(Value::as_object) {
                for (name, input) in listed {
                    let resolved = input
                        .get("id")
                        .and_then(id_key)
                        .and_then(|id| filenames.get(&id));
                    if let Some(filename) = resolved {
                        inputs.insert(name.clone(), filename.clone());
                    }
                }
            }
            records.push(JobRecord {
                tool,
                state: state.to_string(),
                inputs,
            });
        }
    }
    Ok(records)
}
