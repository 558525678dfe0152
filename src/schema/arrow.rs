// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Fields, Schema as ArrowSchema};
use std::sync::Arc;

use super::types::{Dtype, FeatureSpec, FEATURES, FEATURES_FIELD, LABEL_COLUMN};

/// Map a declared feature dtype into an Arrow DataType.
pub fn map_to_arrow_type(dtype: Dtype) -> DataType {
    match dtype {
        Dtype::Int32 => DataType::Int32,
    }
}

/// Child fields of the `features` struct column, in schema order.
pub fn feature_fields(specs: &[FeatureSpec]) -> Fields {
    specs
        .iter()
        .map(|spec| ArrowField::new(spec.name, map_to_arrow_type(spec.dtype), false))
        .collect()
}

/// Storage schema of a split file:
/// - `donated_mar_07` → Int64 class index
/// - `features`       → Struct { V1..V4: Int32 }
pub fn build_arrow_schema() -> Arc<ArrowSchema> {
    Arc::new(ArrowSchema::new(vec![
        ArrowField::new(LABEL_COLUMN, DataType::Int64, false),
        ArrowField::new(
            FEATURES_FIELD,
            DataType::Struct(feature_fields(&FEATURES)),
            false,
        ),
    ]))
}
