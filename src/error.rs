use std::{io, num::ParseIntError};

use thiserror::Error;

/// Failures raised while turning CSV rows into examples.
///
/// None of these are recovered: a single bad row aborts the generation pass.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("column '{column}': cannot convert '{value}' to int32: {source}")]
    ValueConversion {
        column: String,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("unknown label code '{code}'")]
    UnknownLabel { code: String },
    #[error("row is missing column '{column}'")]
    MissingColumn { column: String },
    #[error("row has unexpected column '{column}'")]
    UnexpectedColumn { column: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
