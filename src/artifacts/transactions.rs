use crate::error::GraphError;
use crate::types::{TransactionRecord, Year};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const FROM_COLUMN: &str = "from_address";
const TO_COLUMN: &str = "to_address";

/// Anything that can hand out the raw transfers of a given year
pub trait TransactionSource {
    fn load_year(&self, year: Year) -> Result<Vec<TransactionRecord>>;
}

/// Reads `transactions_{year}_query_df.csv` from a data directory, plain, gzip-compressed
/// or packed in a zip archive
#[derive(Debug, Clone)]
pub struct CsvTransactionSource {
    data_dir: PathBuf,
}

impl CsvTransactionSource {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn csv_path(&self, year: Year) -> PathBuf {
        self.data_dir
            .join(format!("transactions_{}_query_df.csv", year))
    }

    pub fn gzip_path(&self, year: Year) -> PathBuf {
        self.data_dir
            .join(format!("transactions_{}_query_df.csv.gz", year))
    }

    pub fn zip_path(&self, year: Year) -> PathBuf {
        self.data_dir
            .join(format!("transactions_{}_query_df.csv.zip", year))
    }

    /// Years for which a transaction file exists in the data directory
    pub fn available_years(&self) -> Result<BTreeSet<Year>> {
        let pattern = self.data_dir.join("transactions_*_query_df.csv*");
        let pattern = pattern.to_string_lossy();
        let year_pattern = Regex::new(r"^transactions_(\d{4})_query_df\.csv(\.gz|\.zip)?$")?;

        let mut years = BTreeSet::new();
        for entry in glob::glob(&pattern).context("Invalid data directory pattern")? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let year = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| year_pattern.captures(name))
                .and_then(|captures| captures[1].parse::<Year>().ok());
            if let Some(year) = year {
                years.insert(year);
            }
        }

        debug!("Found data for years {:?} in {:?}", years, self.data_dir);
        Ok(years)
    }

    fn open(&self, year: Year) -> Result<(PathBuf, Box<dyn Read>)> {
        let plain = self.csv_path(year);
        if plain.exists() {
            let file = File::open(&plain).with_context(|| format!("Failed to open {:?}", plain))?;
            return Ok((plain, Box::new(file)));
        }

        let gzip = self.gzip_path(year);
        if gzip.exists() {
            let file = File::open(&gzip).with_context(|| format!("Failed to open {:?}", gzip))?;
            return Ok((gzip, Box::new(GzDecoder::new(file))));
        }

        let archive = self.zip_path(year);
        if archive.exists() {
            let content = read_zip_entry(&archive, &format!("transactions_{}_query_df.csv", year))?;
            return Ok((archive, Box::new(Cursor::new(content))));
        }

        Err(GraphError::MissingInput { year, path: plain }.into())
    }
}

/// Contents of `entry_name` in the archive, or of its only entry when the name is absent
fn read_zip_entry(path: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut archive =
        zip::ZipArchive::new(file).with_context(|| format!("Invalid zip archive {:?}", path))?;

    let has_entry = archive.file_names().any(|name| name == entry_name);
    let mut entry = if has_entry {
        archive.by_name(entry_name)?
    } else if archive.len() == 1 {
        archive.by_index(0)?
    } else {
        return Err(anyhow::anyhow!(
            "{:?} has no entry named {} and holds {} files",
            path,
            entry_name,
            archive.len()
        ));
    };

    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .with_context(|| format!("Failed to extract {} from {:?}", entry_name, path))?;
    Ok(content)
}

impl TransactionSource for CsvTransactionSource {
    fn load_year(&self, year: Year) -> Result<Vec<TransactionRecord>> {
        let start = Instant::now();
        let (path, reader) = self.open(year)?;
        info!("Loading transactions for {} from {:?}", year, path);

        let records = read_records(reader)
            .with_context(|| format!("Failed to read transactions for {} from {:?}", year, path))?;

        info!(
            "Loaded {} transactions for {} in {:.2}s",
            records.len(),
            year,
            start.elapsed().as_secs_f64()
        );
        Ok(records)
    }
}

/// Parse the sender and receiver columns of a CSV stream; empty cells become `None`
pub fn read_records<R: Read>(reader: R) -> Result<Vec<TransactionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .with_context(|| format!("Missing column '{}'", name))
    };
    let from_index = column(FROM_COLUMN)?;
    let to_index = column(TO_COLUMN)?;

    let cell = |record: &csv::StringRecord, index: usize| {
        record
            .get(index)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(TransactionRecord {
            from: cell(&row, from_index),
            to: cell(&row, to_index),
        });
    }

    Ok(records)
}

/// Year-indexed records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    years: BTreeMap<Year, Vec<TransactionRecord>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: Year, records: Vec<TransactionRecord>) {
        self.years.insert(year, records);
    }
}

impl TransactionSource for InMemorySource {
    fn load_year(&self, year: Year) -> Result<Vec<TransactionRecord>> {
        self.years.get(&year).cloned().ok_or_else(|| {
            GraphError::MissingInput {
                year,
                path: PathBuf::from("<memory>"),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = ",from_address,to_address\n\
                          0,0xaa,0xbb\n\
                          1,0xaa,\n\
                          2,0xbb,0xAA\n";

    #[test]
    fn test_read_records_keeps_missing_as_none() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], TransactionRecord::new("0xaa", "0xbb"));
        assert_eq!(records[1].to, None);
        // addresses are not normalised
        assert_eq!(records[2].to.as_deref(), Some("0xAA"));
    }

    #[test]
    fn test_missing_column_fails() {
        let result = read_records("from_address,amount\n0xaa,1\n".as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_plain_and_gzip() {
        let temp_dir = TempDir::new().unwrap();
        let source = CsvTransactionSource::new(temp_dir.path());

        std::fs::write(source.csv_path(2018), SAMPLE).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        std::fs::write(source.gzip_path(2019), encoder.finish().unwrap()).unwrap();

        assert_eq!(source.load_year(2018).unwrap().len(), 3);
        assert_eq!(source.load_year(2019).unwrap().len(), 3);
        assert_eq!(
            source.available_years().unwrap().into_iter().collect::<Vec<_>>(),
            vec![2018, 2019]
        );
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_load_zip_archive() {
        let temp_dir = TempDir::new().unwrap();
        let source = CsvTransactionSource::new(temp_dir.path());

        let archive = zip_bytes(&[
            ("README.txt", "not transactions"),
            ("transactions_2020_query_df.csv", SAMPLE),
        ]);
        std::fs::write(source.zip_path(2020), archive).unwrap();

        let records = source.load_year(2020).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], TransactionRecord::new("0xaa", "0xbb"));
        assert_eq!(
            source.available_years().unwrap().into_iter().collect::<Vec<_>>(),
            vec![2020]
        );
    }

    #[test]
    fn test_zip_with_single_entry_of_other_name() {
        let temp_dir = TempDir::new().unwrap();
        let source = CsvTransactionSource::new(temp_dir.path());
        std::fs::write(source.zip_path(2021), zip_bytes(&[("export.csv", SAMPLE)])).unwrap();

        assert_eq!(source.load_year(2021).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_year_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let source = CsvTransactionSource::new(temp_dir.path());

        let err = source.load_year(2021).unwrap_err();
        let graph_error = err.downcast_ref::<GraphError>().unwrap();
        assert!(matches!(graph_error, GraphError::MissingInput { year: 2021, .. }));
    }

    #[test]
    fn test_in_memory_source() {
        let mut source = InMemorySource::new();
        source.insert(2020, vec![TransactionRecord::new("a", "b")]);

        assert_eq!(source.load_year(2020).unwrap().len(), 1);
        assert!(source.load_year(2021).is_err());
    }
}
