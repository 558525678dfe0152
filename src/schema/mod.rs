pub mod arrow;
pub mod types;
pub mod write;

pub use self::arrow::{build_arrow_schema, map_to_arrow_type};
pub use types::{
    ClassLabel, Dtype, FeatureSpec, FeaturesDict, LabelMapping, DONATED_MAR_07, FEATURES,
    FEATURES_FIELD, LABEL, LABEL_COLUMN,
};
pub use write::{read_json, write_json};
