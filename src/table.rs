//! Simple in-memory tables of strings.
//!
//! Tables are used for query results and for external datasets joined to queries.

use crate::{utils, Error, Result};

use std::io::{BufRead, Write};
use std::path::Path;

//-----------------------------------------------------------------------------

/// A table with named columns and string values.
///
/// Every row has exactly one value for each column.
///
/// # Examples
///
/// ```
/// use variant_base::Table;
///
/// let input = "Sample\tColor\nA\tred\nB\tblue\n";
/// let table = Table::from_reader(input.as_bytes(), b'\t').unwrap();
/// assert_eq!(table.columns(), &["Sample", "Color"]);
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.column_values("Color").unwrap(), vec!["red", "blue"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a new table.
    ///
    /// Returns an error if a row has the wrong number of values.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != columns.len()) {
            return Err(Error::invalid_argument(format!(
                "Row {} has {} values for {} columns", index, row.len(), columns.len()
            )));
        }
        Ok(Table { columns, rows })
    }

    /// Reads a delimited table with a header line.
    pub fn from_reader<R: BufRead>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }
        Self::new(columns, rows)
    }

    /// Reads a table from a file, which may be gzip-compressed.
    ///
    /// Files with extension `.csv` or `.csv.gz` are comma-separated, while other files are tab-separated.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let name = filename.as_ref().to_string_lossy();
        let delimiter = if name.ends_with(".csv") || name.ends_with(".csv.gz") { b',' } else { b'\t' };
        let reader = utils::open_file(&filename)?;
        Self::from_reader(reader, delimiter)
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|x| x == name)
    }

    /// Returns the values in the named column.
    ///
    /// Returns [`Error::NotFound`] if there is no such column.
    pub fn column_values(&self, name: &str) -> Result<Vec<&str>> {
        let index = self.column_index(name).ok_or(Error::not_found(format!("No column {} in the table", name)))?;
        Ok(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Returns a copy of the table with a new column appended.
    ///
    /// Returns an error if the column exists or the number of values is wrong.
    pub fn with_column(&self, name: &str, values: Vec<String>) -> Result<Self> {
        if self.column_index(name).is_some() {
            return Err(Error::invalid_argument(format!("Column {} already exists", name)));
        }
        if values.len() != self.len() {
            return Err(Error::invalid_argument(format!(
                "Column {} has {} values for {} rows", name, values.len(), self.len()
            )));
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self.rows.iter().zip(values).map(|(row, value)| {
            let mut row = row.clone();
            row.push(value);
            row
        }).collect();
        Ok(Table { columns, rows })
    }

    /// Returns a copy of the table with only the rows accepted by the predicate.
    pub fn filter<F: FnMut(&[String]) -> bool>(&self, mut predicate: F) -> Self {
        let rows = self.rows.iter().filter(|row| predicate(row)).cloned().collect();
        Table { columns: self.columns.clone(), rows }
    }

    /// Writes the table in the tab-separated format.
    pub fn write_tsv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(output);
        writer.write_record(&self.columns)?;
        for row in self.rows.iter() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
