use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::{fs::File, io::Read, path::Path};
use tracing::trace;

use crate::error::DatasetError;
use crate::process::convert::{generate_example, Example, RawRow};

/// Pull-based reader that yields one [`Example`] per CSV data row, in file order.
///
/// Single pass: once exhausted (or after an error) re-open the source to read again.
pub struct ExampleReader<R: Read> {
    headers: StringRecord,
    records: StringRecordsIntoIter<R>,
    produced: u64,
    failed: bool,
}

impl ExampleReader<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = File::open(path.as_ref())?;
        Self::new(file)
    }
}

impl<R: Read> ExampleReader<R> {
    /// Reads the header row immediately; data rows are read lazily.
    pub fn new(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        trace!(?headers, "read csv header");
        Ok(Self {
            headers,
            records: rdr.into_records(),
            produced: 0,
            failed: false,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Number of examples yielded so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn to_raw_row(&self, record: &StringRecord) -> RawRow {
        self.headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<R: Read> Iterator for ExampleReader<R> {
    type Item = Result<Example, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.records.next()? {
            Ok(record) => generate_example(self.to_raw_row(&record)),
            Err(e) => Err(e.into()),
        };
        match &result {
            Ok(_) => self.produced += 1,
            Err(_) => self.failed = true,
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\"V1\",\"V2\",\"V3\",\"V4\",\"donated_mar_07\"\n\
                          2,50,12500,98,\"2\"\n\
                          0,13,3250,28,\"2\"\n\
                          1,16,4000,35,\"1\"\n\
                          ?,0,0,2,\"2\"\n";

    #[test]
    fn yields_one_example_per_row_in_order() {
        let examples: Vec<Example> = ExampleReader::new(Cursor::new(SAMPLE))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(examples.len(), 4);
        let firsts: Vec<i32> = examples.iter().map(|e| e.features["V1"]).collect();
        assert_eq!(firsts, vec![2, 0, 1, -1]);
        let labels: Vec<&str> = examples.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["yes", "yes", "no", "yes"]);
    }

    #[test]
    fn counts_produced_examples() {
        let mut reader = ExampleReader::new(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(reader.produced(), 0);
        reader.next().unwrap().unwrap();
        reader.next().unwrap().unwrap();
        assert_eq!(reader.produced(), 2);
        assert_eq!(reader.by_ref().count(), 2);
        assert_eq!(reader.produced(), 4);
        assert!(reader.next().is_none());
    }

    #[test]
    fn header_only_file_is_empty() {
        let reader = ExampleReader::new(Cursor::new("V1,V2,V3,V4,donated_mar_07\n")).unwrap();
        assert_eq!(reader.headers().len(), 5);
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn stops_after_first_bad_row() {
        let data = "V1,V2,V3,V4,donated_mar_07\n1,1,1,1,1\n1,1,1,1,9\n1,1,1,1,2\n";
        let mut reader = ExampleReader::new(Cursor::new(data)).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next().unwrap(),
            Err(DatasetError::UnknownLabel { .. })
        ));
        assert!(reader.next().is_none());
        assert_eq!(reader.produced(), 1);
    }

    #[test]
    fn ragged_row_is_a_csv_error() {
        let data = "V1,V2,V3,V4,donated_mar_07\n1,1,1\n";
        let mut reader = ExampleReader::new(Cursor::new(data)).unwrap();
        assert!(matches!(reader.next().unwrap(), Err(DatasetError::Csv(_))));
    }

    #[test]
    fn reads_from_path() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.as_bytes()).unwrap();
        let n = ExampleReader::from_path(tmp.path()).unwrap().count();
        assert_eq!(n, 4);
    }
}
