//! Synthetic TIFF fixture generation.
//!
//! The sweep enumerates axis signatures, pads them with singleton axes, and
//! writes every (signature, target, dtype) fixture exactly once. Multi-series
//! archives and one delivery zip per target are assembled afterwards.
pub mod axes;
pub mod volume;

use crate::config::{validate_config, GenerateConfig};
use crate::dtype::Dtype;
use crate::paths::DataPaths;
use crate::tiff::{read_tiff, write_tiff, ImageSeries};
use crate::util::{display_path, publish_bytes};
use anyhow::{anyhow, Context, Result};
use axes::{base_signatures, signature_for, AxisSignature, Completion, AXIS_Q};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use volume::{binarize, SampleVolumes};

pub const FIXTURE_EXTENSION: &str = "tiff";
pub const SAME_FORMAT_ARCHIVE: &str = "multiseries1.tiff";
pub const MIXED_FORMAT_ARCHIVE: &str = "multiseries2.tiff";

/// Fixture families; each gets its own directory and delivery zip.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Continuous-valued samples.
    Intensity,
    /// Samples thresholded into two levels.
    Binary,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Intensity, Target::Binary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Intensity => "intensity",
            Target::Binary => "binary",
        }
    }
}

/// One planned fixture family member: a signature, a target and its encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSpec {
    pub signature: AxisSignature,
    pub target: Target,
    pub dtypes: Vec<Dtype>,
}

/// Deterministic file name: `{dtype}_{axis}{extent}_....tiff`.
pub fn fixture_file_name(dtype: Dtype, signature: &AxisSignature) -> String {
    format!("{dtype}_{}.{FIXTURE_EXTENSION}", signature.hint())
}

/// Expand the configured universe into the ordered list of fixtures to write.
///
/// The configured dtype sweep only runs for bare signatures without a Q axis;
/// when uint8 is configured, every completed signature also gets a uint8
/// fixture in drawn and reversed order.
pub fn plan_fixtures(config: &GenerateConfig) -> Result<Vec<FixtureSpec>> {
    let universe: Vec<char> = config.axes_universe.chars().collect();
    let reduced = config.dtypes.contains(&Dtype::Uint8);
    let mut plan = Vec::new();
    for base in base_signatures(config)? {
        for completion in Completion::ALL {
            let Some(completed) = completion.apply(&base, &universe) else {
                tracing::debug!(signature = %base, ?completion, "skipped C/S clash");
                continue;
            };
            if !completed.is_admissible() {
                continue;
            }
            for &target in &config.targets {
                if completion == Completion::Bare && !completed.contains(AXIS_Q) {
                    plan.push(FixtureSpec {
                        signature: completed.clone(),
                        target,
                        dtypes: config.dtypes.clone(),
                    });
                }
                if !reduced {
                    continue;
                }
                plan.push(FixtureSpec {
                    signature: completed.clone(),
                    target,
                    dtypes: vec![Dtype::Uint8],
                });
                plan.push(FixtureSpec {
                    signature: completed.reversed(),
                    target,
                    dtypes: vec![Dtype::Uint8],
                });
            }
        }
    }
    Ok(plan)
}

/// Encode one Sample Volume for a target and dtype.
pub fn encode_fixture(
    volume: &ndarray::ArrayD<f64>,
    signature: &AxisSignature,
    target: Target,
    dtype: Dtype,
) -> Result<ImageSeries> {
    if volume.shape() != signature.shape() {
        return Err(anyhow!(
            "volume shape {:?} does not match signature {signature}",
            volume.shape()
        ));
    }
    let data = match target {
        Target::Intensity => dtype.encode(volume.iter()),
        Target::Binary => dtype.encode(binarize(volume)?.iter()),
    };
    ImageSeries::new(&signature.axes(), signature.shape().to_vec(), dtype, data)
}

/// Remove `*.tiff` left by earlier runs so the sweep starts from a clean slate.
pub fn purge_stale_fixtures(paths: &DataPaths) -> Result<usize> {
    let mut removed = 0;
    for target in Target::ALL {
        let dir = paths.target_dir(target);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        for path in list_fixtures(&dir)? {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, "purged stale fixtures");
    }
    Ok(removed)
}

/// Sorted `*.tiff` files directly inside `dir`.
pub fn list_fixtures(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        let is_fixture = path
            .extension()
            .is_some_and(|ext| ext == FIXTURE_EXTENSION);
        if path.is_file() && is_fixture {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// What one generation pass produced.
#[derive(Debug, Default, Serialize)]
pub struct GenerationSummary {
    pub fixtures_written: usize,
    pub sample_volumes: usize,
    pub archives: Vec<PathBuf>,
    pub delivery_zips: Vec<PathBuf>,
}

/// Run the full sweep into `paths`; stale fixtures must already be purged.
pub fn generate(paths: &DataPaths, config: &GenerateConfig) -> Result<GenerationSummary> {
    validate_config(config)?;
    let start = Instant::now();
    let plan = plan_fixtures(config)?;
    let mut volumes = SampleVolumes::new(config.seed, config.sigma);
    let mut written: BTreeSet<PathBuf> = BTreeSet::new();
    let mut summary = GenerationSummary::default();

    for spec in &plan {
        let dir = paths.target_dir(spec.target);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        for &dtype in &spec.dtypes {
            let path = dir.join(fixture_file_name(dtype, &spec.signature));
            if written.contains(&path) {
                continue;
            }
            let volume = volumes.get(spec.signature.shape())?;
            let series = encode_fixture(volume, &spec.signature, spec.target, dtype)
                .with_context(|| format!("encode {}", display_path(&path, Some(paths.root()))))?;
            write_tiff(&path, std::slice::from_ref(&series))?;
            tracing::debug!(
                path = %display_path(&path, Some(paths.root())),
                ndim = spec.signature.ndim(),
                "wrote fixture"
            );
            written.insert(path);
        }
    }
    summary.fixtures_written = written.len();
    summary.sample_volumes = volumes.cached_shapes();

    for &target in &config.targets {
        summary
            .archives
            .extend(write_multiseries_archives(paths, config, target, &written)?);
        summary
            .delivery_zips
            .push(write_delivery_zip(paths, target, config.include_multiseries_in_zip)?);
    }

    tracing::info!(
        fixtures = summary.fixtures_written,
        sample_volumes = summary.sample_volumes,
        archives = summary.archives.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "fixture generation complete"
    );
    Ok(summary)
}

/// Concatenate every series of `sources` into one multi-series file.
pub fn join_images(output: &Path, sources: &[PathBuf]) -> Result<()> {
    let mut series = Vec::new();
    for source in sources {
        series.extend(read_tiff(source)?);
    }
    write_tiff(output, &series)
}

fn write_multiseries_archives(
    paths: &DataPaths,
    config: &GenerateConfig,
    target: Target,
    written: &BTreeSet<PathBuf>,
) -> Result<Vec<PathBuf>> {
    let dir = paths.target_dir(target);
    let plane = signature_for(&['Y', 'X'], config)?;
    let volume = signature_for(&['Y', 'X', 'Z'], config)?;
    let plane_uint8 = dir.join(fixture_file_name(Dtype::Uint8, &plane));
    let volume_float32 = dir.join(fixture_file_name(Dtype::Float32, &volume));

    let archives = [
        (SAME_FORMAT_ARCHIVE, vec![plane_uint8.clone(), plane_uint8.clone()]),
        (MIXED_FORMAT_ARCHIVE, vec![plane_uint8, volume_float32]),
    ];
    let mut created = Vec::new();
    for (name, sources) in archives {
        if let Some(missing) = sources.iter().find(|source| !written.contains(*source)) {
            tracing::warn!(
                archive = name,
                missing = %display_path(missing, Some(paths.root())),
                "skipping multi-series archive; source fixture was not generated"
            );
            continue;
        }
        let output = dir.join(name);
        join_images(&output, &sources)?;
        created.push(output);
    }
    Ok(created)
}

fn write_delivery_zip(paths: &DataPaths, target: Target, include_archives: bool) -> Result<PathBuf> {
    let dir = paths.target_dir(target);
    let dest = paths.delivery_zip_path(target);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = 0usize;
    for path in list_fixtures(&dir)? {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("fixture path {} is not valid UTF-8", path.display()))?;
        let is_archive = file_name == SAME_FORMAT_ARCHIVE || file_name == MIXED_FORMAT_ARCHIVE;
        if is_archive && !include_archives {
            continue;
        }
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        writer
            .start_file(paths.archive_entry_name(target, file_name), options)
            .with_context(|| format!("add {file_name} to zip"))?;
        writer.write_all(&bytes)?;
        entries += 1;
    }
    let bytes = writer.finish().context("finish delivery zip")?.into_inner();
    publish_bytes(&dest, &bytes)?;
    tracing::info!(
        target = target.as_str(),
        entries,
        path = %display_path(&dest, Some(paths.root())),
        "wrote delivery zip"
    );
    Ok(dest)
}
