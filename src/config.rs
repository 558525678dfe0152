use anyhow::{Context, Result};
use std::{env, path::PathBuf};

use crate::dataset::{NAME, URL, VERSION};

/// Runtime settings. Every field has a default; see [`Config::from_env`] for overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub url: String,
    pub batch_rows: usize,
    pub force_download: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            url: URL.to_string(),
            batch_rows: 1024,
            force_download: false,
        }
    }
}

impl Config {
    /// Defaults overridden by `BLOOD_TRANSFUSION_DATA_DIR`, `BLOOD_TRANSFUSION_URL`,
    /// `BLOOD_TRANSFUSION_BATCH_ROWS` and `BLOOD_TRANSFUSION_FORCE_DOWNLOAD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(dir) = lookup("BLOOD_TRANSFUSION_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("BLOOD_TRANSFUSION_URL") {
            cfg.url = url;
        }
        if let Some(rows) = lookup("BLOOD_TRANSFUSION_BATCH_ROWS") {
            cfg.batch_rows = rows
                .trim()
                .parse()
                .with_context(|| format!("BLOOD_TRANSFUSION_BATCH_ROWS={:?}", rows))?;
        }
        if let Some(flag) = lookup("BLOOD_TRANSFUSION_FORCE_DOWNLOAD") {
            cfg.force_download = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(cfg)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    /// `<data_dir>/<name>/<version>`: split files and `dataset_info.json`.
    pub fn dataset_dir(&self) -> PathBuf {
        self.data_dir.join(NAME).join(VERSION)
    }
}
