// src/process/split.rs
use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{ArrayRef, Int32Builder, Int64Builder, StructArray},
    datatypes::{DataType, Schema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};

use crate::error::DatasetError;
use crate::process::convert::Example;
use crate::schema::{
    arrow::build_arrow_schema,
    types::{FEATURES, FEATURES_FIELD, LABEL},
};

/// Output filename of one shard: `<dataset>-<split>.parquet-<shard>-of-<num_shards>`.
pub fn shard_filename(dataset: &str, split: &str, shard: usize, num_shards: usize) -> String {
    format!(
        "{}-{}.parquet-{:05}-of-{:05}",
        dataset, split, shard, num_shards
    )
}

/// Buffers examples into column builders and flushes Arrow batches to one Parquet shard.
pub struct SplitWriter {
    schema: Arc<Schema>,
    writer: ArrowWriter<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    batch_rows: usize,
    labels: Int64Builder,
    features: Vec<Int32Builder>,
    pending: usize,
    total_rows: u64,
}

impl SplitWriter {
    pub fn create(path: &Path, batch_rows: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating split directory {}", parent.display()))?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("split path has no file name: {}", path.display()))?;
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

        let schema = build_arrow_schema();
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(3)?))
            .build();
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating file {}", tmp_path.display()))?;
        let writer = match ArrowWriter::try_new(BufWriter::new(file), schema.clone(), Some(props)) {
            Ok(w) => w,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e).context("creating parquet writer");
            }
        };

        let batch_rows = batch_rows.max(1);
        Ok(Self {
            schema,
            writer,
            tmp_path,
            final_path: path.to_path_buf(),
            batch_rows,
            labels: Int64Builder::with_capacity(batch_rows),
            features: FEATURES
                .iter()
                .map(|_| Int32Builder::with_capacity(batch_rows))
                .collect(),
            pending: 0,
            total_rows: 0,
        })
    }

    pub fn write(&mut self, example: &Example) -> Result<()> {
        let idx = LABEL
            .str2int(example.label)
            .ok_or_else(|| anyhow!("label '{}' is not a declared class", example.label))?;
        self.labels.append_value(idx);

        for (spec, builder) in FEATURES.iter().zip(self.features.iter_mut()) {
            let value = example
                .features
                .get(spec.name)
                .ok_or_else(|| anyhow!("example is missing feature {}", spec.name))?;
            builder.append_value(*value);
        }

        self.pending += 1;
        if self.pending >= self.batch_rows {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }

        let children = match self.schema.field_with_name(FEATURES_FIELD)?.data_type() {
            DataType::Struct(children) => children.clone(),
            other => return Err(anyhow!("features column has type {:?}", other)),
        };
        let feature_arrays: Vec<ArrayRef> = self
            .features
            .iter_mut()
            .map(|b| Arc::new(b.finish()) as ArrayRef)
            .collect();
        let features = StructArray::try_new(children, feature_arrays, None)
            .context("building features struct")?;
        let labels = Arc::new(self.labels.finish()) as ArrayRef;

        let batch = RecordBatch::try_new(self.schema.clone(), vec![labels, Arc::new(features)])
            .context("building split record batch")?;
        self.writer.write(&batch).context("writing batch to parquet")?;

        debug!(rows = self.pending, "flushed batch");
        self.total_rows += self.pending as u64;
        self.pending = 0;
        Ok(())
    }

    /// Flush remaining rows, close the file and move it into place.
    /// Returns `(rows, bytes)`.
    pub fn finish(mut self) -> Result<(u64, u64)> {
        self.flush()?;
        self.writer.close().context("closing parquet writer")?;
        fs::rename(&self.tmp_path, &self.final_path).with_context(|| {
            format!(
                "renaming {} -> {}",
                self.tmp_path.display(),
                self.final_path.display()
            )
        })?;
        let bytes = fs::metadata(&self.final_path)
            .context("getting file metadata")?
            .len();
        Ok((self.total_rows, bytes))
    }
}

/// Drain `examples` into a single-shard Parquet file at `out_path`.
///
/// The first conversion error aborts the pass and no file is left behind.
#[instrument(level = "info", skip(examples), fields(out = %out_path.display()))]
pub fn write_split<I>(examples: I, out_path: &Path, batch_rows: usize) -> Result<(u64, u64)>
where
    I: IntoIterator<Item = Result<Example, DatasetError>>,
{
    let mut writer = SplitWriter::create(out_path, batch_rows)?;
    let tmp_path = writer.tmp_path.clone();

    // `writer` is moved in and dropped before the cleanup below runs
    let result = (move || {
        for (idx, example) in examples.into_iter().enumerate() {
            let example =
                example.with_context(|| format!("generating example at row {}", idx))?;
            writer
                .write(&example)
                .with_context(|| format!("writing example at row {}", idx))?;
        }
        writer.finish()
    })();

    match result {
        Ok((rows, bytes)) => {
            info!(rows, bytes, "split written");
            Ok((rows, bytes))
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}
