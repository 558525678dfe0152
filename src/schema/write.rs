use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Pretty-print `value` as JSON to `dir/file_name`, writing a dotted tmp file
/// first and renaming it over the target.
pub fn write_json<T: Serialize>(dir: impl AsRef<Path>, file_name: &str, value: &T) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(file_name);

    let tmp_path = dir.join(format!(".{}.tmp", file_name));
    let mut tmp = fs::File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value).context("serializing JSON")?;
    tmp.write_all(b"\n")?;
    tmp.sync_all()?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(path)
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let f = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(f).with_context(|| format!("parsing {}", path.display()))
}
