//! Typed paths into the `data/` output layout.
//!
//! Fixtures, delivery archives and the tool registry cache all live under one
//! data directory; path construction is centralized here.
use crate::fixtures::Target;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";

/// Convenience wrapper for locating data-directory artifacts.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `images/tiff/` directory path.
    pub fn tiff_dir(&self) -> PathBuf {
        self.root.join("images").join("tiff")
    }

    /// Return the `images/tiff/<target>/` directory path.
    pub fn target_dir(&self, target: Target) -> PathBuf {
        self.tiff_dir().join(target.as_str())
    }

    /// Return the `tiff-<target>-images.zip` delivery archive path.
    pub fn delivery_zip_path(&self, target: Target) -> PathBuf {
        self.root.join(format!("tiff-{}-images.zip", target.as_str()))
    }

    /// Return the cached registry download, `tools.json`.
    pub fn tools_json_path(&self) -> PathBuf {
        self.root.join("tools.json")
    }

    /// Return the flattened catalog, `tools.csv`.
    pub fn tools_csv_path(&self) -> PathBuf {
        self.root.join("tools.csv")
    }

    /// Archive entry name for a fixture, rooted at the data directory's own name.
    pub fn archive_entry_name(&self, target: Target, file_name: &str) -> String {
        let root_name = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        format!("{root_name}/images/tiff/{}/{file_name}", target.as_str())
    }
}
