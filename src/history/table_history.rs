use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::Schema as ArrowSchema,
    record_batch::RecordBatch,
};
use chrono::{NaiveDate, Utc};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::{
    collections::HashSet,
    fs::{self, File},
    io::BufWriter,
    marker::PhantomData,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// A row in a history table.
pub trait HistoryRow: Sized {
    /// Column index of the dedupe key (must be Utf8).
    const KEY_COLUMN: usize;
    /// Table directory name under the history root.
    const TABLE: &'static str;
    /// Date partition (UTC) for hive-style `date=YYYYMMDD` directories.
    fn partition_date(&self) -> NaiveDate;
    fn schema() -> ArrowSchema;
    /// Single-row column arrays matching [`HistoryRow::schema`].
    fn to_arrays(&self) -> Vec<ArrayRef>;
    fn unique_key(&self) -> String;
}

/// Date-partitioned, append-only history table stored as one Parquet file per row.
pub struct TableHistory<R: HistoryRow> {
    base_dir: PathBuf,
    schema: Arc<ArrowSchema>,
    seen: Mutex<HashSet<String>>,
    _marker: PhantomData<R>,
}

impl<R: HistoryRow> TableHistory<R> {
    /// Open the table under `base_dir`, loading keys already on disk.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let base_dir = base_dir.into();
        let table_dir = base_dir.join(R::TABLE);
        fs::create_dir_all(&table_dir)
            .with_context(|| format!("could not create `{}`", table_dir.display()))?;

        let mut seen = HashSet::new();
        for entry in glob(&format!("{}/date=*/*.parquet", table_dir.display()))? {
            let path = entry?;
            let file =
                File::open(&path).with_context(|| format!("failed to open `{}`", path.display()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
                .with_batch_size(1024)
                .build()?;
            for batch in reader {
                let batch = batch?;
                let keys = batch
                    .column(R::KEY_COLUMN)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| anyhow!("key column of `{}` is not Utf8", path.display()))?;
                seen.extend(keys.iter().flatten().map(str::to_string));
            }
        }
        debug!(table = R::TABLE, keys = seen.len(), "loaded history");

        Ok(Arc::new(Self {
            base_dir,
            schema: Arc::new(R::schema()),
            seen: Mutex::new(seen),
            _marker: PhantomData,
        }))
    }

    fn table_dir(&self) -> PathBuf {
        self.base_dir.join(R::TABLE)
    }

    /// Append `row` unless its key was already recorded. Returns whether it was written.
    pub fn add(&self, row: &R) -> Result<bool> {
        let key = row.unique_key();
        {
            let mut seen = self
                .seen
                .lock()
                .map_err(|_| anyhow!("history lock poisoned"))?;
            if !seen.insert(key.clone()) {
                return Ok(false);
            }
        }

        let partition = format!("date={}", row.partition_date().format("%Y%m%d"));
        let dir = self.table_dir().join(partition);
        fs::create_dir_all(&dir)?;

        let ts = Utc::now().timestamp_micros();
        let fname = format!("{}---{}.parquet", key, ts);
        let tmp = dir.join(format!("{}.tmp", fname));
        let final_path = dir.join(&fname);

        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), self.schema.clone(), None)?;
        let batch = RecordBatch::try_new(self.schema.clone(), row.to_arrays())?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&tmp, &final_path)?;
        Ok(true)
    }

    /// Number of distinct keys recorded, including rows loaded from disk.
    pub fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen
            .lock()
            .map(|seen| seen.contains(key))
            .unwrap_or(false)
    }

    /// Merge each partition's files into a single `consolidated.parquet`.
    pub fn vacuum(&self) -> Result<()> {
        for part in fs::read_dir(self.table_dir())? {
            let part = part?;
            if !part.file_type()?.is_dir() {
                continue;
            }
            let dir = part.path();
            let files = glob(&format!("{}/*.parquet", dir.display()))?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            if files.len() < 2 {
                continue;
            }

            let tmp = dir.join("consolidated.parquet.tmp");
            let mut writer =
                ArrowWriter::try_new(BufWriter::new(File::create(&tmp)?), self.schema.clone(), None)?;
            for p in &files {
                let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(p)?)?
                    .with_batch_size(1024)
                    .build()?;
                for batch in reader {
                    writer.write(&batch?)?;
                }
            }
            writer.close()?;

            for p in &files {
                fs::remove_file(p)?;
            }
            fs::rename(&tmp, dir.join("consolidated.parquet"))?;
        }
        Ok(())
    }
}
