//! Generator configuration helpers.
//!
//! Defaults reproduce the standard fixture set; a JSON file can override any
//! field for smaller or differently-shaped sweeps.
use crate::dtype::Dtype;
use crate::fixtures::Target;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::path::Path;

/// Remote tool registry flattened into the tool catalog.
pub const DEFAULT_TOOLS_URL: &str = "https://raw.githubusercontent.com/galaxyproject/galaxy_codex/refs/heads/main/communities/imaging/resources/tools_filtered_by_ts_categories.json";

/// Environment override for the registry URL.
pub const TOOLS_URL_ENV: &str = "TESTKIT_TOOLS_URL";

/// Fixture sweep parameters.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    /// Ordered axis labels combinations are drawn from.
    pub axes_universe: String,
    /// Seed for every Sample Volume's random field.
    pub seed: u64,
    /// Extent of the first non-C/S axis; later axes add their position.
    pub base_extent: usize,
    /// Extent of the channel axis `C`.
    pub channel_extent: usize,
    /// Extent of the sample axis `S`.
    pub sample_extent: usize,
    /// Blur width; `None` derives it from the smallest extent.
    pub sigma: Option<f64>,
    /// Fixture families to write.
    pub targets: Vec<Target>,
    /// Encodings of the full sweep; uint8 also enables the reduced fixtures.
    pub dtypes: Vec<Dtype>,
    pub include_multiseries_in_zip: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        default_config()
    }
}

/// Build the config that reproduces the standard fixture set.
pub fn default_config() -> GenerateConfig {
    GenerateConfig {
        axes_universe: "YXZTQCS".to_string(),
        seed: 0,
        base_extent: 10,
        channel_extent: 3,
        sample_extent: 5,
        sigma: None,
        targets: Target::ALL.to_vec(),
        dtypes: Dtype::ALL.to_vec(),
        include_multiseries_in_zip: true,
    }
}

/// Load a config file, falling back to defaults for absent fields.
pub fn load_config(path: &Path) -> Result<GenerateConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: GenerateConfig =
        serde_json::from_slice(&bytes).context("parse generator config JSON")?;
    Ok(config)
}

/// Validate a config before any file is touched.
pub fn validate_config(config: &GenerateConfig) -> Result<()> {
    let mut seen = BTreeSet::new();
    for label in config.axes_universe.chars() {
        if !label.is_ascii_alphabetic() || !label.is_ascii_uppercase() {
            return Err(anyhow!(
                "axis label {label:?} must be an uppercase ASCII letter"
            ));
        }
        if !seen.insert(label) {
            return Err(anyhow!("axis label {label:?} appears twice in axes_universe"));
        }
    }
    for required in ['Y', 'X'] {
        if !seen.contains(&required) {
            return Err(anyhow!("axes_universe must contain {required}"));
        }
    }
    if config.base_extent == 0 || config.channel_extent == 0 || config.sample_extent == 0 {
        return Err(anyhow!("axis extents must be positive"));
    }
    if let Some(sigma) = config.sigma {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(anyhow!("sigma must be a positive number, got {sigma}"));
        }
    }
    check_selection("targets", &config.targets)?;
    check_selection("dtypes", &config.dtypes)?;
    Ok(())
}

fn check_selection<T: Ord + std::fmt::Debug>(field: &str, values: &[T]) -> Result<()> {
    if values.is_empty() {
        return Err(anyhow!("{field} must name at least one value"));
    }
    let mut seen = BTreeSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(anyhow!("{field} lists {value:?} twice"));
        }
    }
    Ok(())
}

/// Resolve the registry URL: explicit flag, then environment, then default.
pub fn resolve_tools_url(explicit: Option<&str>) -> String {
    if let Some(url) = explicit.map(str::trim).filter(|url| !url.is_empty()) {
        return url.to_string();
    }
    match env::var(TOOLS_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => DEFAULT_TOOLS_URL.to_string(),
    }
}
