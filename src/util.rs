use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse JSON {}", path.display()))?;
    Ok(value)
}

/// Write bytes next to `dest` and rename into place, so readers never see a
/// partially written file.
pub fn publish_bytes(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("stage {}", dest.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", dest.display()))?;
    tmp.persist(dest)
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_strips_base_when_possible() {
        let base = Path::new("/tmp/data");
        assert_eq!(
            display_path(Path::new("/tmp/data/images/a.tiff"), Some(base)),
            "images/a.tiff"
        );
        assert_eq!(display_path(Path::new("/elsewhere/a.tiff"), Some(base)), "/elsewhere/a.tiff");
    }

    #[test]
    fn publish_bytes_replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("nested").join("out.bin");
        publish_bytes(&dest, b"first").expect("publish first");
        publish_bytes(&dest, b"second").expect("publish second");
        assert_eq!(fs::read(&dest).expect("read back"), b"second");
        let leftovers = fs::read_dir(dest.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(leftovers, 1);
    }
}
