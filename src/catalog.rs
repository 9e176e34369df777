//! Tool Catalog: the reference set of fully qualified tool identifiers.
//!
//! The catalog is a CSV flattened from the community tool registry. Each row
//! names a suite and a quoted list of tool-name suffixes.
use crate::util::{display_path, publish_bytes};
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;

pub const SUITE_ID_COLUMN: &str = "Suite ID";
pub const TOOL_IDS_COLUMN: &str = "Tool IDs";

/// One catalog row: a suite and its tool-name suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub suite_id: String,
    pub tool_names: Vec<String>,
}

impl CatalogEntry {
    /// Fully qualified `suite/tool` identifiers.
    pub fn qualified_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.tool_names
            .iter()
            .map(move |name| format!("{}/{name}", self.suite_id))
    }
}

/// Expected tool identifiers; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCatalog {
    tool_ids: BTreeSet<String>,
}

impl ToolCatalog {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let tool_ids = entries
            .into_iter()
            .flat_map(|entry| entry.qualified_ids().collect::<Vec<_>>())
            .collect();
        Self { tool_ids }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
        let catalog = Self::from_csv_reader(file)
            .with_context(|| format!("parse tool catalog {}", path.display()))?;
        if catalog.is_empty() {
            tracing::warn!(path = %path.display(), "tool catalog lists no tools");
        } else {
            tracing::debug!(tools = catalog.len(), path = %path.display(), "loaded tool catalog");
        }
        Ok(catalog)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers().context("read catalog header")?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| anyhow!("catalog is missing the {name:?} column"))
        };
        let suite_column = column(SUITE_ID_COLUMN)?;
        let tools_column = column(TOOL_IDS_COLUMN)?;

        let mut entries = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("read catalog row {}", row + 1))?;
            let suite_id = record.get(suite_column).unwrap_or_default().trim();
            let raw_tools = record.get(tools_column).unwrap_or_default();
            if suite_id.is_empty() || raw_tools.trim().is_empty() {
                tracing::debug!(row = row + 1, "skipping catalog row without suite or tools");
                continue;
            }
            let tool_names = parse_tool_list(raw_tools)
                .with_context(|| format!("catalog row {} ({suite_id})", row + 1))?;
            entries.push(CatalogEntry {
                suite_id: suite_id.to_string(),
                tool_names,
            });
        }
        Ok(Self::from_entries(entries))
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tool_ids.contains(tool_id)
    }

    pub fn tool_ids(&self) -> &BTreeSet<String> {
        &self.tool_ids
    }

    pub fn len(&self) -> usize {
        self.tool_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tool_ids.is_empty()
    }
}

/// Parse a single-quoted list such as `['a', 'b']` by normalizing the quotes.
pub fn parse_tool_list(raw: &str) -> Result<Vec<String>> {
    let normalized = raw.replace('\'', "\"");
    serde_json::from_str(&normalized).with_context(|| format!("parse tool list {raw:?}"))
}

/// Download the registry unless a cached copy exists (or `refresh` is set).
pub fn fetch_registry(url: &str, cache_path: &Path, refresh: bool) -> Result<()> {
    if !refresh && cache_path.is_file() {
        tracing::info!(path = %cache_path.display(), "using cached tool registry");
        return Ok(());
    }
    tracing::info!(url, "downloading tool registry");
    let mut response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch {url}"))?;
    let bytes = response
        .body_mut()
        .with_config()
        .limit(64 * 1024 * 1024)
        .read_to_vec()
        .with_context(|| format!("read response body from {url}"))?;
    serde_json::from_slice::<Value>(&bytes).context("registry response is not JSON")?;
    publish_bytes(cache_path, &bytes)?;
    tracing::info!(bytes = bytes.len(), path = %cache_path.display(), "cached tool registry");
    Ok(())
}

/// Flatten the registry (a JSON array of objects) into catalog CSV.
///
/// Columns are the union of keys in first-seen order. Lists are rendered as
/// single-quoted `['a', 'b']`, which [`parse_tool_list`] reads back.
pub fn flatten_registry(registry: &Value) -> Result<Vec<u8>> {
    let records: Vec<&Map<String, Value>> = registry
        .as_array()
        .ok_or_else(|| anyhow!("tool registry must be a JSON array"))?
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object()
                .ok_or_else(|| anyhow!("registry entry {index} is not an object"))
        })
        .collect::<Result<_>>()?;

    let mut columns: Vec<&str> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns).context("write catalog header")?;
    for record in &records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| record.get(*column).map(render_cell).unwrap_or_default())
            .collect();
        writer.write_record(&row).context("write catalog row")?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow!("flush catalog CSV: {}", err.error()))
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => format!("'{text}'"),
                    other => render_cell(other),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(_) => value.to_string(),
    }
}

/// Fetch (or reuse) the registry and write the flattened catalog next to it.
pub fn refresh_catalog(
    url: &str,
    json_path: &Path,
    csv_path: &Path,
    refresh: bool,
) -> Result<ToolCatalog> {
    fetch_registry(url, json_path, refresh)?;
    let registry: Value = crate::util::read_json(json_path)?;
    let csv_bytes = flatten_registry(&registry)?;
    publish_bytes(csv_path, &csv_bytes)?;
    let catalog = ToolCatalog::from_csv_reader(csv_bytes.as_slice())?;
    tracing::info!(
        tools = catalog.len(),
        path = %display_path(csv_path, json_path.parent()),
        "wrote tool catalog"
    );
    Ok(catalog)
}
