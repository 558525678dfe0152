use std::collections::{BTreeMap, HashMap};
use std::num::ParseIntError;

use crate::error::DatasetError;
use crate::schema::types::{LabelMapping, DONATED_MAR_07, FEATURES, LABEL_COLUMN};

/// Missing-value marker used by the source CSV.
pub const MISSING: &str = "?";

/// One CSV line keyed by header name.
pub type RawRow = HashMap<String, String>;

/// A converted row: category name plus the four integer features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub label: &'static str,
    pub features: BTreeMap<&'static str, i32>,
}

/// `"?"` becomes `-1`, anything else must parse as an `i32` once surrounding
/// whitespace is trimmed. The marker itself only matches exactly.
pub fn convert_feature(value: &str) -> Result<i32, ParseIntError> {
    if value == MISSING {
        Ok(-1)
    } else {
        value.trim().parse::<i32>()
    }
}

pub fn convert_label(code: &str, mapping: &LabelMapping) -> Result<&'static str, DatasetError> {
    mapping.get(code).ok_or_else(|| DatasetError::UnknownLabel {
        code: code.to_string(),
    })
}

/// Convert one raw row into an [`Example`].
///
/// The row must hold exactly the label column plus every schema feature;
/// missing or extra columns are errors, as are unparsable values.
pub fn generate_example(mut row: RawRow) -> Result<Example, DatasetError> {
    let code = row
        .remove(LABEL_COLUMN)
        .ok_or_else(|| DatasetError::MissingColumn {
            column: LABEL_COLUMN.to_string(),
        })?;
    let label = convert_label(&code, &DONATED_MAR_07)?;

    let mut features = BTreeMap::new();
    for spec in FEATURES.iter() {
        let value = row
            .remove(spec.name)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: spec.name.to_string(),
            })?;
        let converted = (spec.convert)(&value).map_err(|source| DatasetError::ValueConversion {
            column: spec.name.to_string(),
            value,
            source,
        })?;
        features.insert(spec.name, converted);
    }

    if let Some(column) = row.into_keys().min() {
        return Err(DatasetError::UnexpectedColumn { column });
    }

    Ok(Example { label, features })
}
