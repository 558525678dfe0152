// src/schema/types.rs

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::num::ParseIntError;

/// Name of the label column in the source CSV.
pub const LABEL_COLUMN: &str = "donated_mar_07";

/// Name of the nested features field in the declared schema.
pub const FEATURES_FIELD: &str = "features";

/// Declared numeric type of a feature column.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int32,
}

/// One feature column: its declared type and the function that converts the raw token.
#[derive(Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub dtype: Dtype,
    pub convert: fn(&str) -> Result<i32, ParseIntError>,
}

impl std::fmt::Debug for FeatureSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureSpec")
            .field("name", &self.name)
            .field("dtype", &self.dtype)
            .finish()
    }
}

/// V1: months since last donation, V2: total number of donations,
/// V3: total blood donated in ml, V4: months since first donation.
pub static FEATURES: Lazy<Vec<FeatureSpec>> = Lazy::new(|| {
    ["V1", "V2", "V3", "V4"]
        .into_iter()
        .map(|name| FeatureSpec {
            name,
            dtype: Dtype::Int32,
            convert: crate::process::convert::convert_feature,
        })
        .collect()
});

/// Closed mapping from the raw label code to its category name. No default.
#[derive(Debug, Clone, Copy)]
pub struct LabelMapping(&'static [(&'static str, &'static str)]);

impl LabelMapping {
    pub fn get(&self, code: &str) -> Option<&'static str> {
        self.0.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(c, _)| *c)
    }
}

pub static DONATED_MAR_07: LabelMapping = LabelMapping(&[("2", "yes"), ("1", "no")]);

/// Categorical label declaration. Class index is the position in `names`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq)]
pub struct ClassLabel {
    pub names: Vec<String>,
}

impl ClassLabel {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    pub fn str2int(&self, name: &str) -> Option<i64> {
        self.names.iter().position(|n| n == name).map(|i| i as i64)
    }

    pub fn int2str(&self, idx: i64) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }
}

pub static LABEL: Lazy<ClassLabel> = Lazy::new(|| ClassLabel::new(&["yes", "no"]));

/// Serializable view of the declared features, handed to the registry and
/// persisted in `dataset_info.json`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct FeaturesDict {
    pub label_field: String,
    pub label: ClassLabel,
    pub features_field: String,
    /// Ordered `(name, dtype)` pairs.
    pub features: Vec<(String, Dtype)>,
}

impl FeaturesDict {
    pub fn declared() -> Self {
        Self {
            label_field: LABEL_COLUMN.to_string(),
            label: LABEL.clone(),
            features_field: FEATURES_FIELD.to_string(),
            features: FEATURES
                .iter()
                .map(|f| (f.name.to_string(), f.dtype))
                .collect(),
        }
    }
}
