// src/dataset/mod.rs

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Config,
    error::DatasetError,
    fetch,
    history::{DownloadedRow, GeneratedRow, HistoryRow, TableHistory},
    process::{shard_filename, write_split, ExampleReader},
    schema::{read_json, write_json, FeaturesDict, FEATURES_FIELD, LABEL_COLUMN},
};

pub const NAME: &str = "blood_transfusion";
pub const VERSION: &str = "1.0.0";
pub const URL: &str = "https://www.openml.org/data/get_csv/1586225/php0iVrYT";
pub const HOMEPAGE: &str = "https://www.openml.org/d/1464";
pub const INFO_FILE: &str = "dataset_info.json";

pub const CITATION: &str = r#"@ONLINE {blood_transfusion,
author = "I-Cheng Yeh, King-Jang Yang, Tao-Ming Ting",
title  = "blood transfusion service center",
month  = "may",
year   = "2015",
url    = "https://www.openml.org/d/1464"
}
"#;

pub const DESCRIPTION: &str = "Dataset describing whether a person donated blood in March 2007 \
based on the features months since last donation (V1), total number of donations (V2), \
total blood donated in ml (V3) and months since first donation (V4).";

/// Named partition of the dataset. There is no predefined train/val/test split,
/// so only `Train` is ever generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
        }
    }
}

/// What to generate for one split and where its rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitGenerator {
    pub name: Split,
    pub num_shards: usize,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub name: Split,
    pub num_shards: usize,
    pub num_examples: u64,
    pub num_bytes: u64,
    pub files: Vec<String>,
}

/// Registration metadata. Citation and description are informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub citation: String,
    pub urls: Vec<String>,
    pub features: FeaturesDict,
    pub supervised_keys: (String, String),
    /// URL the splits were generated from; empty until prepared.
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub splits: Vec<SplitInfo>,
}

/// Dataset builder for the OpenML blood transfusion service center data.
#[derive(Debug, Default, Clone, Copy)]
pub struct BloodTransfusion;

impl BloodTransfusion {
    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            name: NAME.to_string(),
            version: VERSION.to_string(),
            description: DESCRIPTION.to_string(),
            citation: CITATION.to_string(),
            urls: vec![HOMEPAGE.to_string()],
            features: FeaturesDict::declared(),
            supervised_keys: (FEATURES_FIELD.to_string(), LABEL_COLUMN.to_string()),
            source_url: String::new(),
            splits: Vec::new(),
        }
    }

    /// Exactly one split, `train`, in a single shard, covering the whole file.
    pub fn split_generators(&self, downloaded: &Path) -> Vec<SplitGenerator> {
        vec![SplitGenerator {
            name: Split::Train,
            num_shards: 1,
            file_path: downloaded.to_path_buf(),
        }]
    }

    pub fn generate_examples(&self, file_path: &Path) -> Result<ExampleReader<File>, DatasetError> {
        ExampleReader::from_path(file_path)
    }

    /// Download (or reuse) the source file, write every split to Parquet and
    /// persist `dataset_info.json`. Returns the stored info untouched when this
    /// version was already generated from `cfg.url` and its files are on disk,
    /// unless `cfg.force_download` is set.
    #[instrument(level = "info", skip(self, client, cfg), fields(url = %cfg.url))]
    pub async fn download_and_prepare(&self, client: &Client, cfg: &Config) -> Result<DatasetInfo> {
        let dataset_dir = cfg.dataset_dir();
        let downloaded_hist = TableHistory::<DownloadedRow>::new_downloaded(cfg.history_dir())?;
        let generated_hist = TableHistory::<GeneratedRow>::new_generated(cfg.history_dir())?;

        let info_path = dataset_dir.join(INFO_FILE);
        if !cfg.force_download && info_path.is_file() {
            let existing: DatasetInfo = read_json(&info_path)?;
            if self.is_prepared(&existing, cfg, &generated_hist) {
                info!(path = %info_path.display(), "dataset already prepared");
                return Ok(existing);
            }
            debug!(
                previous_url = %existing.source_url,
                "stored dataset does not match current source, regenerating"
            );
        }

        let download_start = Utc::now();
        let downloaded =
            fetch::download_file(client, &cfg.url, cfg.downloads_dir(), cfg.force_download)
                .await?;
        if !downloaded.cached {
            let cache_file = downloaded
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let row = DownloadedRow {
                source_url: cfg.url.clone(),
                cache_file,
                size_bytes: downloaded.size_bytes,
                forced: cfg.force_download,
                download_start,
                download_end: Utc::now(),
            };
            if !downloaded_hist.add(&row)? {
                warn!(key = %row.unique_key(), "download already recorded");
            }
            downloaded_hist.vacuum()?;
            debug!(downloads = downloaded_hist.len(), "recorded download");
        }
        info!(path = %downloaded.path.display(), bytes = downloaded.size_bytes, cached = downloaded.cached, "source ready");

        let mut dataset_info = self.info();
        dataset_info.source_url = cfg.url.clone();
        for generator in self.split_generators(&downloaded.path) {
            let split = generator.name.as_str();
            let file_name = shard_filename(NAME, split, 0, generator.num_shards);
            let out_path = dataset_dir.join(&file_name);

            let generation_start = Utc::now();
            let examples = self
                .generate_examples(&generator.file_path)
                .with_context(|| format!("opening {}", generator.file_path.display()))?;
            let batch_rows = cfg.batch_rows;
            // conversion + parquet writing are blocking, keep them off the runtime threads
            let (rows, bytes) = tokio::task::spawn_blocking({
                let out_path = out_path.clone();
                move || write_split(examples, &out_path, batch_rows)
            })
            .await??;
            info!(split, rows, bytes, "generated split");

            let recorded = generated_hist.add(&GeneratedRow {
                split: split.to_string(),
                version: VERSION.to_string(),
                source_url: cfg.url.clone(),
                source_file: generator.file_path.display().to_string(),
                num_examples: rows,
                size_bytes: bytes,
                generation_start,
                generation_end: Utc::now(),
            })?;
            if !recorded {
                debug!(split, "split was generated from this source before, history unchanged");
            }

            dataset_info.splits.push(SplitInfo {
                name: generator.name,
                num_shards: generator.num_shards,
                num_examples: rows,
                num_bytes: bytes,
                files: vec![file_name],
            });
        }
        generated_hist.vacuum()?;

        write_json(&dataset_dir, INFO_FILE, &dataset_info)?;
        Ok(dataset_info)
    }

    /// Stored info is reusable when it is this version, came from `cfg.url`,
    /// every split is in the generated history for that URL and every file exists.
    fn is_prepared(
        &self,
        existing: &DatasetInfo,
        cfg: &Config,
        generated: &TableHistory<GeneratedRow>,
    ) -> bool {
        let dataset_dir = cfg.dataset_dir();
        existing.version == VERSION
            && existing.source_url == cfg.url
            && !existing.splits.is_empty()
            && existing.splits.iter().all(|s| {
                generated.contains(&GeneratedRow::key_for(VERSION, s.name.as_str(), &cfg.url))
                    && s.files.iter().all(|f| dataset_dir.join(f).is_file())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "\"V1\",\"V2\",\"V3\",\"V4\",\"donated_mar_07\"\n\
                          2,50,12500,98,\"2\"\n\
                          0,13,3250,28,\"2\"\n\
                          1,16,4000,35,\"2\"\n\
                          2,20,5000,45,\"2\"\n\
                          1,24,6000,77,\"1\"\n";

    fn config_with_cached_source(root: &Path) -> Config {
        let cfg = Config {
            data_dir: root.to_path_buf(),
            // unroutable: the cached copy must be used
            url: "http://127.0.0.1:9/data/get_csv/1586225/php0iVrYT".to_string(),
            batch_rows: 2,
            force_download: false,
        };
        fs::create_dir_all(cfg.downloads_dir()).unwrap();
        fs::write(cfg.downloads_dir().join("php0iVrYT"), SAMPLE).unwrap();
        cfg
    }

    #[test]
    fn info_declares_label_and_features() {
        let info = BloodTransfusion.info();
        assert_eq!(info.name, "blood_transfusion");
        assert_eq!(info.version, "1.0.0");
        assert_eq!(info.features.label.names, vec!["yes", "no"]);
        let names: Vec<_> = info.features.features.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["V1", "V2", "V3", "V4"]);
        assert_eq!(
            info.supervised_keys,
            ("features".to_string(), "donated_mar_07".to_string())
        );
        assert!(info.citation.contains("blood transfusion service center"));
        assert!(info.splits.is_empty());
    }

    #[test]
    fn single_train_split() {
        let gens = BloodTransfusion.split_generators(Path::new("/tmp/x.csv"));
        assert_eq!(gens.len(), 1);
        assert_eq!(gens[0].name, Split::Train);
        assert_eq!(gens[0].num_shards, 1);
        assert_eq!(gens[0].file_path, PathBuf::from("/tmp/x.csv"));
    }

    #[test]
    fn generate_examples_reads_whole_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("src.csv");
        fs::write(&path, SAMPLE).unwrap();
        let labels: Vec<&str> = BloodTransfusion
            .generate_examples(&path)
            .unwrap()
            .map(|e| e.unwrap().label)
            .collect();
        assert_eq!(labels, vec!["yes", "yes", "yes", "yes", "no"]);
    }

    #[tokio::test]
    async fn prepares_from_cached_source() {
        let tmp = tempdir().unwrap();
        let cfg = config_with_cached_source(tmp.path());

        let info = BloodTransfusion
            .download_and_prepare(&Client::new(), &cfg)
            .await
            .unwrap();

        assert_eq!(info.splits.len(), 1);
        let train = &info.splits[0];
        assert_eq!(train.name, Split::Train);
        assert_eq!(train.num_examples, 5);
        assert_eq!(
            train.files,
            vec!["blood_transfusion-train.parquet-00000-of-00001".to_string()]
        );
        assert!(cfg.dataset_dir().join(&train.files[0]).is_file());

        let on_disk: DatasetInfo = read_json(cfg.dataset_dir().join(INFO_FILE)).unwrap();
        assert_eq!(on_disk, info);
    }

    #[tokio::test]
    async fn second_run_reuses_prepared_dataset() {
        let tmp = tempdir().unwrap();
        let cfg = config_with_cached_source(tmp.path());

        let first = BloodTransfusion
            .download_and_prepare(&Client::new(), &cfg)
            .await
            .unwrap();
        // removing the source proves nothing is regenerated
        fs::remove_file(cfg.downloads_dir().join("php0iVrYT")).unwrap();
        let second = BloodTransfusion
            .download_and_prepare(&Client::new(), &cfg)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn changed_source_url_regenerates() {
        let tmp = tempdir().unwrap();
        let mut cfg = config_with_cached_source(tmp.path());
        let header = "V1,V2,V3,V4,donated_mar_07\n";
        fs::write(cfg.downloads_dir().join("first.csv"), format!("{}1,1,1,1,1\n", header)).unwrap();
        fs::write(
            cfg.downloads_dir().join("second.csv"),
            format!("{}1,1,1,1,1\n2,2,2,2,2\n3,3,3,3,1\n", header),
        )
        .unwrap();

        cfg.url = "http://127.0.0.1:9/data/first.csv".to_string();
        let first = BloodTransfusion
            .download_and_prepare(&Client::new(), &cfg)
            .await
            .unwrap();
        assert_eq!(first.splits[0].num_examples, 1);
        assert_eq!(first.source_url, cfg.url);

        cfg.url = "http://127.0.0.1:9/data/second.csv".to_string();
        let second = BloodTransfusion
            .download_and_prepare(&Client::new(), &cfg)
            .await
            .unwrap();
        assert_eq!(second.splits[0].num_examples, 3);
        assert_eq!(second.source_url, cfg.url);

        let on_disk: DatasetInfo = read_json(cfg.dataset_dir().join(INFO_FILE)).unwrap();
        assert_eq!(on_disk, second);
    }

    #[tokio::test]
    async fn force_download_refetches_and_regenerates() {
        let tmp = tempdir().unwrap();
        let mut cfg = config_with_cached_source(tmp.path());
        let fresh = "V1,V2,V3,V4,donated_mar_07\n1,1,1,1,1\n?,2,2,2,2\n3,3,3,3,1\n";
        let base = fetch::testing::serve_bodies(vec![fresh.to_string()]).await;
        cfg.url = format!("{}/data/get_csv/1586225/php0iVrYT", base);
        let client = fetch::testing::client();

        // first run uses the cached five-row copy
        let first = BloodTransfusion
            .download_and_prepare(&client, &cfg)
            .await
            .unwrap();
        assert_eq!(first.splits[0].num_examples, 5);

        cfg.force_download = true;
        let second = BloodTransfusion
            .download_and_prepare(&client, &cfg)
            .await
            .unwrap();
        assert_eq!(second.splits[0].num_examples, 3);
        assert_eq!(
            fs::read_to_string(cfg.downloads_dir().join("php0iVrYT")).unwrap(),
            fresh
        );
        let on_disk: DatasetInfo = read_json(cfg.dataset_dir().join(INFO_FILE)).unwrap();
        assert_eq!(on_disk, second);

        let rows: usize = ExampleReader::from_path(cfg.downloads_dir().join("php0iVrYT"))
            .unwrap()
            .count();
        assert_eq!(rows, 3);

        let downloads = TableHistory::<DownloadedRow>::new_downloaded(cfg.history_dir()).unwrap();
        assert_eq!(downloads.len(), 1);
    }

    #[tokio::test]
    async fn bad_row_fails_the_run() {
        let tmp = tempdir().unwrap();
        let cfg = config_with_cached_source(tmp.path());
        fs::write(
            cfg.downloads_dir().join("php0iVrYT"),
            "V1,V2,V3,V4,donated_mar_07\n1,1,1,1,3\n",
        )
        .unwrap();

        let err = BloodTransfusion
            .download_and_prepare(&Client::new(), &cfg)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("unknown label code '3'"));
        assert!(!cfg.dataset_dir().join(INFO_FILE).exists());
    }
}
