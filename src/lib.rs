pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod history;
pub mod process;
pub mod schema;

pub use config::Config;
pub use dataset::{BloodTransfusion, DatasetInfo, Split, SplitGenerator, SplitInfo};
pub use error::DatasetError;
pub use process::{convert_feature, convert_label, generate_example, Example, ExampleReader, RawRow};
