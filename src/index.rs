use std::collections::HashMap;

use crate::error::{Result, SplitError};
use crate::sheet::SourceSheet;

/// Lookup from stringified identifier to the source row holding it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierIndex {
    column: u16,
    rows: HashMap<String, u32>,
}

impl IdentifierIndex {
    /// 1-based column of the identifier in the source sheet.
    pub fn column(&self) -> u16 {
        self.column
    }

    pub fn row_for(&self, identifier: &str) -> Option<u32> {
        self.rows.get(identifier).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.rows.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Index every data row (2..=max_row) of `sheet` by its identifier cell.
///
/// The identifier column is the first header cell equal to `identifier_column`.
/// Duplicate identifiers keep the last row.
pub fn build_index(sheet: &SourceSheet, identifier_column: &str) -> Result<IdentifierIndex> {
    let column = sheet
        .find_column(identifier_column)
        .ok_or_else(|| SplitError::MissingColumn {
            column: identifier_column.to_string(),
        })?;

    let mut rows = HashMap::new();
    for row in 2..=sheet.max_row() {
        if let Some(key) = sheet.value(row, column).and_then(|v| v.key_string()) {
            rows.insert(key, row);
        }
    }

    Ok(IdentifierIndex { column, rows })
}
