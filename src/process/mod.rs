// src/process/mod.rs

pub mod convert;
pub mod examples;
pub mod split;

pub use convert::{convert_feature, convert_label, generate_example, Example, RawRow, MISSING};
pub use examples::ExampleReader;
pub use split::{shard_filename, write_split, SplitWriter};
