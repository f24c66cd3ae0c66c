use std::collections::{BTreeMap, HashMap};

use crate::models::CellValue;
use crate::style::CellStyle;

/// One cell of the styled source sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceCell {
    pub value: CellValue,
    pub style: CellStyle,
    pub hyperlink: Option<String>,
    /// The cell links somewhere inside the workbook, so there is no target to carry.
    pub internal_link: bool,
}

/// The first worksheet of the uploaded workbook, with formatting.
///
/// Rows and columns are 1-based like in the spreadsheet UI. The sheet is
/// read-only once loaded and shared by every group build.
#[derive(Debug, Clone, Default)]
pub struct SourceSheet {
    pub name: String,
    cells: HashMap<(u32, u16), SourceCell>,
    column_widths: BTreeMap<u16, f64>,
    row_heights: HashMap<u32, f64>,
    max_row: u32,
    max_column: u16,
}

impl SourceSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_cell(&mut self, row: u32, column: u16, cell: SourceCell) {
        self.max_row = self.max_row.max(row);
        self.max_column = self.max_column.max(column);
        self.cells.insert((row, column), cell);
    }

    /// Attach a hyperlink to a cell, creating an empty cell when needed.
    pub fn set_hyperlink(&mut self, row: u32, column: u16, target: impl Into<String>) {
        let target = target.into();
        match self.cells.get_mut(&(row, column)) {
            Some(cell) => cell.hyperlink = Some(target),
            None => self.set_cell(
                row,
                column,
                SourceCell {
                    hyperlink: Some(target),
                    ..SourceCell::default()
                },
            ),
        }
    }

    /// Flag a cell as carrying an in-workbook link, creating an empty cell when needed.
    pub fn mark_internal_link(&mut self, row: u32, column: u16) {
        match self.cells.get_mut(&(row, column)) {
            Some(cell) => cell.internal_link = true,
            None => self.set_cell(
                row,
                column,
                SourceCell {
                    internal_link: true,
                    ..SourceCell::default()
                },
            ),
        }
    }

    pub fn set_column_width(&mut self, column: u16, width: f64) {
        self.column_widths.insert(column, width);
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn cell(&self, row: u32, column: u16) -> Option<&SourceCell> {
        self.cells.get(&(row, column))
    }

    pub fn value(&self, row: u32, column: u16) -> Option<&CellValue> {
        self.cell(row, column).map(|c| &c.value)
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (u16, f64)> + '_ {
        self.column_widths.iter().map(|(c, w)| (*c, *w))
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    pub fn max_column(&self) -> u16 {
        self.max_column
    }

    /// Header names of row 1, left to right. Gaps are empty strings.
    pub fn header(&self) -> Vec<String> {
        (1..=self.max_column)
            .map(|c| self.value(1, c).map(ToString::to_string).unwrap_or_default())
            .collect()
    }

    /// First column (1-based) whose header cell equals `name`.
    pub fn find_column(&self, name: &str) -> Option<u16> {
        (1..=self.max_column).find(|&c| {
            self.value(1, c)
                .is_some_and(|v| matches!(v, CellValue::Text(t) if t == name))
        })
    }
}
