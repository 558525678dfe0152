use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, Int32Array, Int64Array, StructArray};
use blood_transfusion::schema::{FEATURES, FEATURES_FIELD, LABEL, LABEL_COLUMN};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{env, fs::File, path::Path, process::exit};

fn main() {
    // Expect a split file and an optional number of rows to print.
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("{}", usage(&args));
        exit(1);
    }
    let rows = match args.get(2).map(|s| s.parse::<usize>()) {
        None => 10,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("Error: ROWS must be a number: {}", e);
            exit(1);
        }
    };
    if let Err(e) = inspect_split(Path::new(&args[1]), rows) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Usage line; `argv[0]` may be absent when spawned with an empty argument list.
fn usage(args: &[String]) -> String {
    let prog = args.first().map(String::as_str).unwrap_or("inspect_split");
    format!("Usage: {} <SPLIT_FILE> [ROWS]", prog)
}

/// Print file-level metadata, then decode the first `limit` examples.
fn inspect_split(path: &Path, limit: usize) -> Result<()> {
    let reader = SerializedFileReader::new(
        File::open(path).with_context(|| format!("opening {}", path.display()))?,
    )?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();

    println!("=== Split file: {} ===", path.display());
    println!("Total rows:           {}", file_meta.num_rows());
    println!("Number of row groups: {}", meta.num_row_groups());
    println!("File-size on disk:    {} bytes", std::fs::metadata(path)?.len());
    println!();

    println!("=== Columns ===");
    for col in file_meta.schema_descr().columns() {
        println!(
            "- {:<20} | Physical: {:?}",
            col.path().string(),
            col.physical_type()
        );
    }
    println!();

    println!("=== First {} examples ===", limit);
    let batches = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
    let mut printed = 0;
    for batch in batches {
        let batch = batch?;
        let labels = batch
            .column_by_name(LABEL_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| anyhow!("missing Int64 column {}", LABEL_COLUMN))?;
        let features = batch
            .column_by_name(FEATURES_FIELD)
            .and_then(|c| c.as_any().downcast_ref::<StructArray>())
            .ok_or_else(|| anyhow!("missing struct column {}", FEATURES_FIELD))?;
        let columns = FEATURES
            .iter()
            .map(|spec| {
                features
                    .column_by_name(spec.name)
                    .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                    .map(|arr| (spec.name, arr))
                    .ok_or_else(|| anyhow!("missing feature {}", spec.name))
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            if printed >= limit {
                return Ok(());
            }
            let label = LABEL.int2str(labels.value(row)).unwrap_or("<unknown>");
            let values: Vec<String> = columns
                .iter()
                .map(|(name, arr)| format!("{}={}", name, arr.value(row)))
                .collect();
            println!("{:>5}  {:<3}  {}", printed, label, values.join(" "));
            printed += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_without_program_name() {
        assert_eq!(usage(&[]), "Usage: inspect_split <SPLIT_FILE> [ROWS]");
        assert_eq!(
            usage(&["target/debug/inspect_split".to_string()]),
            "Usage: target/debug/inspect_split <SPLIT_FILE> [ROWS]"
        );
    }
}
