use anyhow::Result;
use arrow::{
    array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit},
};
use chrono::{DateTime, NaiveDate, Utc};
use std::{path::PathBuf, sync::Arc};

use crate::history::table_history::{HistoryRow, TableHistory};

/// One split written from a downloaded source file.
///
/// Keyed by version, split and source URL: a split generated from one URL
/// never counts as prepared for another.
pub struct GeneratedRow {
    pub split: String,
    pub version: String,
    pub source_url: String,
    pub source_file: String,
    pub num_examples: u64,
    pub size_bytes: u64,
    pub generation_start: DateTime<Utc>,
    pub generation_end: DateTime<Utc>,
}

impl GeneratedRow {
    /// Filename-safe key: URL characters outside `[A-Za-z0-9.-]` become `_`.
    pub fn key_for(version: &str, split: &str, source_url: &str) -> String {
        let slug: String = source_url
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}-{}-{}", version, split, slug)
    }
}

impl HistoryRow for GeneratedRow {
    const KEY_COLUMN: usize = 0;
    const TABLE: &'static str = "generated";

    fn partition_date(&self) -> NaiveDate {
        self.generation_end.date_naive()
    }

    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("key", ArrowDataType::Utf8, false),
            Field::new("source_url", ArrowDataType::Utf8, false),
            Field::new("source_file", ArrowDataType::Utf8, false),
            Field::new("num_examples", ArrowDataType::UInt64, false),
            Field::new("size_bytes", ArrowDataType::UInt64, false),
            Field::new(
                "generation_start",
                ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Field::new(
                "generation_end",
                ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ])
    }

    fn to_arrays(&self) -> Vec<ArrayRef> {
        vec![
            Arc::new(StringArray::from(vec![self.unique_key()])),
            Arc::new(StringArray::from(vec![self.source_url.clone()])),
            Arc::new(StringArray::from(vec![self.source_file.clone()])),
            Arc::new(UInt64Array::from(vec![self.num_examples])),
            Arc::new(UInt64Array::from(vec![self.size_bytes])),
            Arc::new(TimestampMicrosecondArray::from(vec![self
                .generation_start
                .timestamp_micros()])),
            Arc::new(TimestampMicrosecondArray::from(vec![self
                .generation_end
                .timestamp_micros()])),
        ]
    }

    fn unique_key(&self) -> String {
        Self::key_for(&self.version, &self.split, &self.source_url)
    }
}

impl TableHistory<GeneratedRow> {
    pub fn new_generated(base: impl Into<PathBuf>) -> Result<Arc<Self>> {
        TableHistory::open(base)
    }
}
