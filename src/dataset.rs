use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use tracing::debug;

use crate::error::{Result, SplitError};
use crate::models::CellValue;

/// Ordered rows of a sheet keyed by header name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

/// Borrowed view of one row of a `RecordSet`.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn values(&self) -> &'a [CellValue] {
        self.values
    }
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut values: Vec<CellValue>) {
        values.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// New record set with the rows matching `predicate`, in order.
    pub fn filter<F>(&self, predicate: F) -> RecordSet
    where
        F: Fn(&Record<'_>) -> bool,
    {
        let rows = self
            .records()
            .filter(|record| predicate(record))
            .map(|record| record.values.to_vec())
            .collect();
        RecordSet {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Render as CSV with a header line.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.columns)?;
        for row in &self.rows {
            csv.write_record(row.iter().map(ToString::to_string))?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Load the first sheet of an xlsx workbook as records, using row 1 as the header.
pub fn load_records(bytes: &[u8]) -> Result<RecordSet> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SplitError::NoWorksheet)??;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(RecordSet::default());
    };
    if start_row > 0 {
        debug!(start_row, "first populated row is not row 1; using it as the header");
    }

    // Keep positions aligned with the styled sheet when leading columns are empty.
    let lead = start_col as usize;
    let mut rows = range.rows();
    let header_row = rows.next().unwrap_or_default();
    let mut header: Vec<Data> = vec![Data::Empty; lead];
    header.extend_from_slice(header_row);

    let mut records = RecordSet::new(header_names(&header));
    for row in rows {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let mut values = vec![CellValue::Empty; lead];
        values.extend(row.iter().map(to_cell_value));
        records.push_row(values);
    }
    Ok(records)
}

pub fn read_records(path: &Path) -> Result<RecordSet> {
    let bytes = std::fs::read(path)?;
    load_records(&bytes)
}

/// Header names with blanks named by position and duplicates suffixed `.1`, `.2`, ...
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = match to_cell_value(cell) {
                CellValue::Empty => format!("Unnamed: {i}"),
                value => value.to_string(),
            };
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

fn to_cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}
