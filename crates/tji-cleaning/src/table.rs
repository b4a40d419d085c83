//! In-memory CSV table

use crate::error::{CleaningError, Result};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
        let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| if cell.is_empty() { None } else { Some(cell.to_string()) })
                    .collect(),
            );
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.headers)?;
        for row in &self.rows {
            csv.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_writer(std::fs::File::create(path)?)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(CleaningError::RowLength {
                row: self.rows.len(),
                expected: self.headers.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Result<Vec<Option<&str>>> {
        let index = self.require(name)?;
        Ok(self.rows.iter().map(|row| row[index].as_deref()).collect())
    }

    /// Headers whose `_`-separated parts satisfy `pred`
    pub fn columns_where(&self, pred: impl Fn(&[&str]) -> bool) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| {
                let parts: Vec<&str> = h.split('_').collect();
                pred(&parts)
            })
            .cloned()
            .collect()
    }

    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(Option<&str>) -> Option<String>,
    {
        self.try_map_column(name, |cell| Ok(f(cell)))
    }

    /// Replace every cell of a column; stops at the first error, leaving
    /// earlier rows already rewritten.
    pub fn try_map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(Option<&str>) -> Result<Option<String>>,
    {
        let index = self.require(name)?;
        for row in &mut self.rows {
            row[index] = f(row[index].as_deref())?;
        }
        Ok(())
    }

    /// Trim and uppercase every non-missing cell
    pub fn upcase_strip_string_cells(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let Some(value) = cell {
                    *value = crate::standardize::upcase_strip(value);
                }
            }
        }
    }

    /// Insert a new column directly after `after`
    pub fn insert_column_after(&mut self, values: Vec<Option<String>>, name: &str, after: &str) -> Result<()> {
        let index = self.require(after)? + 1;
        if self.column_index(name).is_some() {
            return Err(CleaningError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.rows.len() {
            return Err(CleaningError::RowLength {
                row: 0,
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        self.headers.insert(index, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(index, value);
        }
        Ok(())
    }

    /// Reorder columns, refusing to drop or invent any
    pub fn reorder_columns_checked<S: AsRef<str>>(&mut self, new_order: &[S]) -> Result<()> {
        let new_order: Vec<&str> = new_order.iter().map(AsRef::as_ref).collect();
        let new_set: HashSet<&str> = new_order.iter().copied().collect();
        if new_set.len() != new_order.len() {
            return Err(CleaningError::DuplicateColumns("new order"));
        }
        let old_set: HashSet<&str> = self.headers.iter().map(String::as_str).collect();
        if old_set.len() != self.headers.len() {
            return Err(CleaningError::DuplicateColumns("original table"));
        }

        if new_set != old_set {
            let mut messages = Vec::new();
            for c in &self.headers {
                if !new_set.contains(c.as_str()) {
                    messages.push(format!("Column '{}' from the original table is missing in new order", c));
                }
            }
            for c in &new_order {
                if !old_set.contains(c) {
                    messages.push(format!("Column '{}' in new order does not exist in the original table", c));
                }
            }
            return Err(CleaningError::ColumnMismatch(messages));
        }

        let indices: Vec<usize> = new_order
            .iter()
            .map(|c| self.require(c))
            .collect::<Result<_>>()?;

        self.headers = indices.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            let reordered: Vec<Option<String>> = indices.iter().map(|&i| row[i].take()).collect();
            *row = reordered;
        }
        Ok(())
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| CleaningError::UnknownColumn(name.to_string()))
    }
}
