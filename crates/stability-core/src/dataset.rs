//! CSV dataset ingest
//!
//! Loads experiment records into named, nullable string columns. No column is
//! assumed to exist: callers look columns up by name and the schema layer
//! degrades when one is missing.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Cell tokens treated as missing values
///
/// `None` is deliberately absent: it is a real `Encapsulation` category.
const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "<NA>"];

/// Column-oriented view of a CSV file
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    headers: Vec<String>,
    columns: HashMap<String, Vec<Option<String>>>,
    rows: usize,
    rows_skipped: usize,
}

impl Dataset {
    /// Read a CSV file from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dataset '{}'", path.display()))?;
        let dataset = Self::from_reader(file)
            .with_context(|| format!("Failed to read dataset '{}'", path.display()))?;

        info!(
            path = %path.display(),
            rows = dataset.rows,
            columns = dataset.headers.len(),
            rows_skipped = dataset.rows_skipped,
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Read CSV records from any reader; the first row is the header
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        let mut rows = 0usize;
        let mut rows_skipped = 0usize;

        for (idx, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    // +2: records start after the header, lines are 1-based
                    warn!(line = idx + 2, error = %e, "Skipping unreadable CSV row");
                    rows_skipped += 1;
                    continue;
                }
            };
            for (col, column) in cells.iter_mut().enumerate() {
                column.push(record.get(col).and_then(normalize_cell));
            }
            rows += 1;
        }

        let mut columns = HashMap::with_capacity(headers.len());
        for (name, column) in headers.iter().zip(cells) {
            if columns.insert(name.clone(), column).is_some() {
                debug!(column = %name, "Duplicate CSV header, keeping the last occurrence");
            }
        }

        Ok(Self {
            headers,
            columns,
            rows,
            rows_skipped,
        })
    }

    /// Build a dataset from in-memory columns
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Option<String>>)>,
        S: Into<String>,
    {
        let mut headers = Vec::new();
        let mut map = HashMap::new();
        let mut rows = 0;
        for (name, values) in columns {
            let name = name.into();
            rows = rows.max(values.len());
            headers.push(name.clone());
            map.insert(name, values);
        }
        Self {
            headers,
            columns: map,
            rows,
            rows_skipped: 0,
        }
    }

    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.headers.len())
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }
}

fn normalize_cell(raw: &str) -> Option<String> {
    if NULL_TOKENS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_columns_and_nulls() {
        let csv = "Encapsulation,Perovskite_thickness\nGlass,400\n,NaN\nEpoxy, 550 \n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(dataset.shape(), (3, 2));
        let enc = dataset.column("Encapsulation").unwrap();
        assert_eq!(enc[0].as_deref(), Some("Glass"));
        assert_eq!(enc[1], None);
        let thickness = dataset.column("Perovskite_thickness").unwrap();
        assert_eq!(thickness[1], None);
        assert_eq!(thickness[2].as_deref(), Some("550"));
    }

    #[test]
    fn test_short_rows_pad_with_none() {
        let csv = "a,b,c\n1,2\n4,5,6\n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.shape(), (2, 3));
        assert_eq!(dataset.column("c").unwrap()[0], None);
        assert_eq!(dataset.column("c").unwrap()[1].as_deref(), Some("6"));
    }

    #[test]
    fn test_missing_column_is_none() {
        let dataset = Dataset::from_reader("a\n1\n".as_bytes()).unwrap();
        assert!(dataset.column("b").is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "x,y\n1,2\n").unwrap();
        let dataset = Dataset::from_path(&path).unwrap();
        assert_eq!(dataset.shape(), (1, 2));
        assert!(Dataset::from_path(&dir.path().join("missing.csv")).is_err());
    }
}
