//! Tar-based results: a workflow invocation export.
//!
//! Dataset ids resolve to file names through the collection listing, with the
//! fixture path prefix stripped from each element identifier.
use super::{JobRecord, ToolId};
use crate::tree::{find_ids, id_key};
use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

pub const COLLECTIONS_MEMBER: &str = "collections_attrs.txt";
pub const JOBS_MEMBER: &str = "jobs_attrs.txt";

/// Prefix the upload step puts on element identifiers of fixture files.
pub const ELEMENT_PREFIX: &str = "data_images_tiff_";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The two JSON listings an invocation export carries.
#[derive(Debug, PartialEq)]
pub struct InvocationExport {
    pub collections: Value,
    pub jobs: Value,
}

/// Read an export archive, gzip-compressed or plain.
pub fn read_invocation_archive(path: &Path) -> Result<InvocationExport> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    parse_invocation_archive(&bytes).with_context(|| format!("parse {}", path.display()))
}

pub fn parse_invocation_archive(bytes: &[u8]) -> Result<InvocationExport> {
    if bytes.starts_with(&GZIP_MAGIC) {
        read_members(GzDecoder::new(bytes))
    } else {
        read_members(bytes)
    }
}

fn read_members<R: Read>(reader: R) -> Result<InvocationExport> {
    let mut archive = tar::Archive::new(reader);
    let mut collections = None;
    let mut jobs = None;
    for entry in archive.entries().context("list archive members")? {
        let mut entry = entry.context("read archive member")?;
        let name = entry.path().context("archive member path")?.to_path_buf();
        let name = name
            .strip_prefix("./")
            .unwrap_or(name.as_path())
            .to_path_buf();
        let slot = if name == Path::new(COLLECTIONS_MEMBER) {
            &mut collections
        } else if name == Path::new(JOBS_MEMBER) {
            &mut jobs
        } else {
            continue;
        };
        let mut text = Vec::new();
        entry
            .read_to_end(&mut text)
            .with_context(|| format!("read {}", name.display()))?;
        let value: Value = serde_json::from_slice(&text)
            .with_context(|| format!("parse {}", name.display()))?;
        *slot = Some(value);
    }
    Ok(InvocationExport {
        collections: collections
            .ok_or_else(|| anyhow!("archive has no {COLLECTIONS_MEMBER} member"))?,
        jobs: jobs.ok_or_else(|| anyhow!("archive has no {JOBS_MEMBER} member"))?,
    })
}

fn strip_prefix<'a>(text: &'a str, prefix: &str) -> &'a str {
    text.strip_prefix(prefix).unwrap_or(text)
}

/// Map encoded dataset ids to fixture file names from collection elements.
pub fn filenames_from_collections(collections: &Value) -> Result<BTreeMap<String, String>> {
    let listing = collections
        .as_array()
        .ok_or_else(|| anyhow!("{COLLECTIONS_MEMBER} must hold a JSON array"))?;
    let mut filenames = BTreeMap::new();
    for (index, collection) in listing.iter().enumerate() {
        let elements = collection
            .pointer("/collection/elements")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("collection {index} has no collection.elements array"))?;
        for element in elements {
            let Some(id) = element.get("encoded_id").and_then(id_key) else {
                continue;
            };
            let Some(identifier) = element.get("element_identifier").and_then(Value::as_str)
            else {
                continue;
            };
            filenames.insert(id, strip_prefix(identifier, ELEMENT_PREFIX).to_string());
        }
    }
    Ok(filenames)
}

/// Normalize the job listing into records with resolved inputs.
pub fn jobs_from_export(export: &InvocationExport) -> Result<Vec<JobRecord>> {
    let filenames = filenames_from_collections(&export.collections)?;
    let listing = export
        .jobs
        .as_array()
        .ok_or_else(|| anyhow!("{JOBS_MEMBER} must hold a JSON array"))?;

    let mut records = Vec::new();
    for (index, job) in listing.iter().enumerate() {
        let raw_tool = job
            .get("tool_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("job {index} has no tool_id"))?;
        let state = job
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("job {index} ({raw_tool}) has no state"))?;
        let Some(tool) = ToolId::parse(raw_tool) else {
            tracing::debug!(tool_id = raw_tool, "skipping job of a built-in tool");
            continue;
        };

        let mut inputs = BTreeMap::new();
        let params = job.get("params").unwrap_or(&Value::Null);
        for dataset in find_ids(params) {
            let Some(parameter) = dataset.parameter() else {
                continue;
            };
            let Some(filename) = id_key(&dataset.id).and_then(|id| filenames.get(&id)) else {
                continue;
            };
            inputs.insert(parameter.to_string(), filename.clone());
        }
        records.push(JobRecord {
            tool,
            state: state.to_string(),
            inputs,
        });
    }
    Ok(records)
}
