use anyhow::Result;
use arrow::{
    array::{ArrayRef, BooleanArray, StringArray, TimestampMicrosecondArray, UInt64Array},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit},
};
use chrono::{DateTime, NaiveDate, Utc};
use std::{path::PathBuf, sync::Arc};

use crate::history::table_history::{HistoryRow, TableHistory};

/// One network fetch of the source CSV. Cache hits are not recorded.
///
/// Every fetch is its own event: the key carries the completion time, so a
/// forced re-download of the same file is logged next to the original.
pub struct DownloadedRow {
    pub source_url: String,
    /// Name of the file in the downloads cache.
    pub cache_file: String,
    pub size_bytes: u64,
    /// Whether a cached copy was deliberately replaced.
    pub forced: bool,
    pub download_start: DateTime<Utc>,
    pub download_end: DateTime<Utc>,
}

impl HistoryRow for DownloadedRow {
    const KEY_COLUMN: usize = 0;
    const TABLE: &'static str = "downloaded";

    fn partition_date(&self) -> NaiveDate {
        self.download_end.date_naive()
    }

    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("key", ArrowDataType::Utf8, false),
            Field::new("source_url", ArrowDataType::Utf8, false),
            Field::new("cache_file", ArrowDataType::Utf8, false),
            Field::new("size_bytes", ArrowDataType::UInt64, false),
            Field::new("forced", ArrowDataType::Boolean, false),
            Field::new(
                "download_start",
                ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Field::new(
                "download_end",
                ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ])
    }

    fn to_arrays(&self) -> Vec<ArrayRef> {
        vec![
            Arc::new(StringArray::from(vec![self.unique_key()])),
            Arc::new(StringArray::from(vec![self.source_url.clone()])),
            Arc::new(StringArray::from(vec![self.cache_file.clone()])),
            Arc::new(UInt64Array::from(vec![self.size_bytes])),
            Arc::new(BooleanArray::from(vec![self.forced])),
            Arc::new(TimestampMicrosecondArray::from(vec![
                self.download_start.timestamp_micros()
            ])),
            Arc::new(TimestampMicrosecondArray::from(vec![
                self.download_end.timestamp_micros()
            ])),
        ]
    }

    fn unique_key(&self) -> String {
        format!("{}-{}", self.cache_file, self.download_end.timestamp_micros())
    }
}

impl TableHistory<DownloadedRow> {
    pub fn new_downloaded(base: impl Into<PathBuf>) -> Result<Arc<Self>> {
        TableHistory::open(base)
    }
}
