//! Formatted row projection.
//!
//! Builds a new single-sheet workbook from a filtered record set. Formatting is
//! not taken from the record's position but from the source row that carries
//! the same identifier, so a mentor's subset keeps each student's colours,
//! borders and row heights. The designated link column shows the identifier and
//! links to the student's form.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dataset::{Record, RecordSet};
use crate::error::{best_effort, Result, SplitError, StyleCopyWarning};
use crate::index::IdentifierIndex;
use crate::models::{CellValue, Config, UnmatchedRowPolicy};
use crate::sheet::{SourceCell, SourceSheet};
use crate::style::CellStyle;

#[derive(Debug, Clone, Copy)]
pub struct ProjectionOptions<'a> {
    pub identifier_column: &'a str,
    pub link_column: &'a str,
    pub sheet_name: &'a str,
    pub unmatched_rows: UnmatchedRowPolicy,
}

impl<'a> ProjectionOptions<'a> {
    pub fn from_config(config: &'a Config) -> Self {
        Self {
            identifier_column: &config.identifier_column,
            link_column: &config.link_column,
            sheet_name: &config.sheet_name,
            unmatched_rows: config.unmatched_rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputCell {
    pub value: CellValue,
    /// Copied source formatting; `None` keeps the writer's default, or the
    /// hyperlink style when `hyperlink_style` is set.
    pub style: Option<CellStyle>,
    pub hyperlink: Option<String>,
    pub hyperlink_style: bool,
}

/// A freshly built single-sheet workbook, not yet serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputWorkbook {
    pub sheet_name: String,
    column_widths: BTreeMap<u16, f64>,
    row_heights: BTreeMap<u32, f64>,
    rows: Vec<Vec<OutputCell>>,
}

impl OutputWorkbook {
    /// Number of written rows, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at a 1-based position.
    pub fn cell(&self, row: u32, column: u16) -> Option<&OutputCell> {
        let row = self.rows.get(row.checked_sub(1)? as usize)?;
        row.get(column.checked_sub(1)? as usize)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[OutputCell]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (u16, f64)> + '_ {
        self.column_widths.iter().map(|(c, w)| (*c, *w))
    }

    pub fn column_width(&self, column: u16) -> Option<f64> {
        self.column_widths.get(&column).copied()
    }

    pub fn row_heights(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.row_heights.iter().map(|(r, h)| (*r, *h))
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }
}

/// Project `records` onto a new workbook styled after `source`.
///
/// Output columns follow the record set's column order and take formatting
/// from the source column at the same position. Records are matched to source
/// rows through `index`; see [`UnmatchedRowPolicy`] for records without a match.
pub fn project(
    source: &SourceSheet,
    index: &IdentifierIndex,
    records: &RecordSet,
    options: &ProjectionOptions<'_>,
) -> Result<OutputWorkbook> {
    if source.find_column(options.identifier_column).is_none() {
        return Err(SplitError::MissingColumn {
            column: options.identifier_column.to_string(),
        });
    }

    let mut out = OutputWorkbook {
        sheet_name: options.sheet_name.to_string(),
        ..OutputWorkbook::default()
    };

    for (column, width) in source.column_widths() {
        out.column_widths.insert(column, width);
    }
    if let Some(height) = best_effort("header row height", || row_height(source, 1)) {
        out.row_heights.insert(1, height);
    }

    out.rows.push(header_row(source, records.columns()));

    let mut unmatched = 0usize;
    for record in records.records() {
        let identifier = record.get(options.identifier_column);
        let matched = identifier
            .and_then(CellValue::key_string)
            .and_then(|key| index.row_for(&key));

        let source_row = match matched {
            Some(row) => Some(row),
            None => {
                unmatched += 1;
                match options.unmatched_rows {
                    UnmatchedRowPolicy::TemplateRow => Some(template_row(source)),
                    UnmatchedRowPolicy::DefaultFormat => None,
                    UnmatchedRowPolicy::Error => {
                        return Err(SplitError::UnmatchedIdentifier {
                            identifier: identifier.map(ToString::to_string).unwrap_or_default(),
                        })
                    }
                }
            }
        };

        let out_row = out.rows.len() as u32 + 1;
        if let Some(src_row) = source_row {
            if let Some(height) = best_effort("row height", || row_height(source, src_row)) {
                out.row_heights.insert(out_row, height);
            }
        }

        out.rows
            .push(data_row(source, records.columns(), &record, source_row, options));
    }

    debug!(
        rows = records.len(),
        unmatched,
        sheet = %out.sheet_name,
        "projected record set"
    );
    Ok(out)
}

/// Source row lent to unmatched records: row 2, or row 1 for header-only sheets.
fn template_row(source: &SourceSheet) -> u32 {
    if source.max_row() >= 2 {
        2
    } else {
        1
    }
}

fn row_height(source: &SourceSheet, row: u32) -> std::result::Result<f64, StyleCopyWarning> {
    source
        .row_height(row)
        .ok_or(StyleCopyWarning::MissingRowHeight(row))
}

fn copy_style(
    source: &SourceSheet,
    row: u32,
    column: u16,
) -> std::result::Result<CellStyle, StyleCopyWarning> {
    source
        .cell(row, column)
        .map(|cell| cell.style.clone())
        .ok_or(StyleCopyWarning::MissingCell { row, column })
}

fn header_row(source: &SourceSheet, columns: &[String]) -> Vec<OutputCell> {
    columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let column = output_column(i);
            let src = source.cell(1, column);

            let value = match src.map(|c| &c.value) {
                Some(value) if !value.is_empty() => value.clone(),
                _ => CellValue::Text(name.clone()),
            };
            let hyperlink = src.and_then(|c| c.hyperlink.clone());
            // Linked header cells take the hyperlink style instead of the source style.
            let style = match hyperlink {
                Some(_) => None,
                None => best_effort("header style", || copy_style(source, 1, column)),
            };

            OutputCell {
                value,
                style,
                hyperlink_style: hyperlink.is_some(),
                hyperlink,
            }
        })
        .collect()
}

fn data_row(
    source: &SourceSheet,
    columns: &[String],
    record: &Record<'_>,
    source_row: Option<u32>,
    options: &ProjectionOptions<'_>,
) -> Vec<OutputCell> {
    columns
        .iter()
        .zip(record.values())
        .enumerate()
        .map(|(i, (name, value))| {
            let column = output_column(i);
            let mut cell = OutputCell {
                value: value.clone(),
                style: source_row
                    .and_then(|row| best_effort("cell style", || copy_style(source, row, column))),
                ..OutputCell::default()
            };

            if name == options.link_column {
                let link = match source_row.and_then(|row| source.cell(row, column)) {
                    Some(SourceCell {
                        hyperlink: Some(target),
                        ..
                    }) => Some(target.clone()),
                    // A link inside the workbook still counts as the cell's link.
                    Some(SourceCell {
                        internal_link: true,
                        ..
                    }) => None,
                    _ => value.is_web_link().then(|| value.to_string()),
                };

                if let Some(link) = link {
                    let identifier = record
                        .get(options.identifier_column)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    cell.value = CellValue::Text(identifier);
                    cell.style = None;
                    cell.hyperlink = Some(link);
                    cell.hyperlink_style = true;
                }
            }

            cell
        })
        .collect()
}

fn output_column(index: usize) -> u16 {
    u16::try_from(index + 1).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::style::{Fill, Font, NumberFormat};
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::FormatPattern;

    const OPTIONS: ProjectionOptions<'static> = ProjectionOptions {
        identifier_column: "ID",
        link_column: "Link",
        sheet_name: "Students",
        unmatched_rows: UnmatchedRowPolicy::TemplateRow,
    };

    fn styled(value: CellValue, color: u32) -> SourceCell {
        SourceCell {
            value,
            style: CellStyle {
                font: Font {
                    bold: true,
                    color: Some(color),
                    ..Font::default()
                },
                fill: Fill {
                    pattern: FormatPattern::Solid,
                    foreground: Some(color),
                    background: None,
                },
                number_format: NumberFormat::Builtin(1),
                ..CellStyle::default()
            },
            hyperlink: None,
            internal_link: false,
        }
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    /// Header `[ID, Name, Link]` with two students; the first links to a form.
    fn source() -> SourceSheet {
        let mut sheet = SourceSheet::new("Roster");
        sheet.set_cell(1, 1, styled(text("ID"), 0x111111));
        sheet.set_cell(1, 2, styled(text("Name"), 0x111111));
        sheet.set_cell(1, 3, styled(text("Link"), 0x111111));
        sheet.set_row_height(1, 30.0);
        sheet.set_column_width(2, 24.5);

        sheet.set_cell(2, 1, styled(CellValue::Number(42.0), 0xFF0000));
        sheet.set_cell(2, 2, styled(text("Amy"), 0xFF0000));
        sheet.set_cell(2, 3, styled(text("Open form"), 0xFF0000));
        sheet.set_hyperlink(2, 3, "http://x/42");
        sheet.set_row_height(2, 18.0);

        sheet.set_cell(3, 1, styled(CellValue::Number(43.0), 0x00FF00));
        sheet.set_cell(3, 2, styled(text("Ben"), 0x00FF00));
        sheet.set_cell(3, 3, styled(text("n/a"), 0x00FF00));
        sheet
    }

    fn records(rows: Vec<Vec<CellValue>>) -> RecordSet {
        let mut set = RecordSet::new(vec!["ID".into(), "Name".into(), "Link".into()]);
        for row in rows {
            set.push_row(row);
        }
        set
    }

    fn run(source: &SourceSheet, records: &RecordSet, options: &ProjectionOptions<'_>) -> OutputWorkbook {
        let index = build_index(source, options.identifier_column).unwrap();
        project(source, &index, records, options).unwrap()
    }

    #[test]
    fn link_column_shows_identifier_and_keeps_source_target() {
        let source = source();
        let out = run(
            &source,
            &records(vec![vec![CellValue::Number(42.0), text("Amy"), text("ignored")]]),
            &OPTIONS,
        );

        assert_eq!(out.row_count(), 2);
        let values: Vec<CellValue> = out.rows().nth(1).unwrap().iter().map(|c| c.value.clone()).collect();
        assert_eq!(values, vec![CellValue::Number(42.0), text("Amy"), text("42")]);

        let link = out.cell(2, 3).unwrap();
        assert_eq!(link.hyperlink.as_deref(), Some("http://x/42"));
        assert!(link.hyperlink_style);
        // The hyperlink style replaces the row's formatting on the link cell.
        assert_eq!(link.style, None);
        assert_eq!(out.cell(2, 2).unwrap().hyperlink, None);
        assert!(out.cell(2, 2).unwrap().style.is_some());
    }

    #[test]
    fn empty_record_set_gives_header_only() {
        let source = source();
        let out = run(&source, &records(Vec::new()), &OPTIONS);

        assert_eq!(out.row_count(), 1);
        let header: Vec<String> = out.rows().next().unwrap().iter().map(|c| c.value.to_string()).collect();
        assert_eq!(header, vec!["ID", "Name", "Link"]);
        assert_eq!(out.cell(1, 1).unwrap().style, Some(source.cell(1, 1).unwrap().style.clone()));
        assert_eq!(out.sheet_name, "Students");
    }

    #[test]
    fn matched_rows_copy_styles_by_identifier_not_position() {
        let source = source();
        // Ben first: his row must still get row 3's formatting.
        let out = run(
            &source,
            &records(vec![
                vec![CellValue::Number(43.0), text("Ben"), text("n/a")],
                vec![CellValue::Number(42.0), text("Amy"), text("x")],
            ]),
            &OPTIONS,
        );

        for column in 1..=2 {
            assert_eq!(
                out.cell(2, column).unwrap().style.as_ref(),
                Some(&source.cell(3, column).unwrap().style)
            );
            assert_eq!(
                out.cell(3, column).unwrap().style.as_ref(),
                Some(&source.cell(2, column).unwrap().style)
            );
        }
        // Ben's source row has no height, Amy's does.
        assert_eq!(out.row_height(2), None);
        assert_eq!(out.row_height(3), Some(18.0));
        assert_eq!(out.row_height(1), Some(30.0));
        assert_eq!(out.column_width(2), Some(24.5));
        assert_eq!(out.column_width(1), None);
    }

    #[test]
    fn plain_value_stays_when_no_link_target_exists() {
        let source = source();
        let out = run(
            &source,
            &records(vec![vec![CellValue::Number(43.0), text("Ben"), text("n/a")]]),
            &OPTIONS,
        );
        let link = out.cell(2, 3).unwrap();
        assert_eq!(link.value, text("n/a"));
        assert_eq!(link.hyperlink, None);
        assert!(!link.hyperlink_style);
    }

    #[test]
    fn raw_url_values_become_links() {
        let source = source();
        let out = run(
            &source,
            &records(vec![vec![
                CellValue::Number(43.0),
                text("Ben"),
                text("https://forms.office.com/r/ben"),
            ]]),
            &OPTIONS,
        );
        let link = out.cell(2, 3).unwrap();
        assert_eq!(link.value, text("43"));
        assert_eq!(link.hyperlink.as_deref(), Some("https://forms.office.com/r/ben"));
        assert_eq!(link.style, None);
    }

    #[test]
    fn internal_links_stop_the_raw_url_fallback() {
        let mut source = source();
        source.mark_internal_link(3, 3);
        let out = run(
            &source,
            &records(vec![vec![
                CellValue::Number(43.0),
                text("Ben"),
                text("https://forms.office.com/r/ben"),
            ]]),
            &OPTIONS,
        );

        let link = out.cell(2, 3).unwrap();
        assert_eq!(link.value, text("https://forms.office.com/r/ben"));
        assert_eq!(link.hyperlink, None);
        assert!(!link.hyperlink_style);
        assert_eq!(link.style.as_ref(), Some(&source.cell(3, 3).unwrap().style));
    }

    #[test]
    fn unmatched_records_borrow_row_two() {
        let source = source();
        let out = run(
            &source,
            &records(vec![vec![CellValue::Number(99.0), text("Zed"), CellValue::Empty]]),
            &OPTIONS,
        );

        assert_eq!(out.cell(2, 2).unwrap().value, text("Zed"));
        assert_eq!(
            out.cell(2, 2).unwrap().style.as_ref(),
            Some(&source.cell(2, 2).unwrap().style)
        );
        // Row 2's link is inherited along with its formatting.
        assert_eq!(out.cell(2, 3).unwrap().hyperlink.as_deref(), Some("http://x/42"));
        assert_eq!(out.cell(2, 3).unwrap().value, text("99"));
        assert_eq!(out.row_height(2), Some(18.0));
    }

    #[test]
    fn header_only_sources_lend_row_one() {
        let mut source = SourceSheet::new("Roster");
        source.set_cell(1, 1, styled(text("ID"), 0x123456));
        source.set_cell(1, 2, styled(text("Name"), 0x123456));
        source.set_cell(1, 3, styled(text("Link"), 0x123456));

        let out = run(
            &source,
            &records(vec![vec![CellValue::Number(1.0), text("Solo"), CellValue::Empty]]),
            &OPTIONS,
        );
        assert_eq!(
            out.cell(2, 1).unwrap().style.as_ref(),
            Some(&source.cell(1, 1).unwrap().style)
        );
    }

    #[test]
    fn unmatched_policies() {
        let source = source();
        let unmatched = records(vec![vec![CellValue::Number(99.0), text("Zed"), CellValue::Empty]]);
        let index = build_index(&source, "ID").unwrap();

        let plain = project(
            &source,
            &index,
            &unmatched,
            &ProjectionOptions {
                unmatched_rows: UnmatchedRowPolicy::DefaultFormat,
                ..OPTIONS
            },
        )
        .unwrap();
        assert_eq!(plain.cell(2, 2).unwrap().style, None);
        assert_eq!(plain.cell(2, 3).unwrap().hyperlink, None);
        assert_eq!(plain.row_height(2), None);

        let err = project(
            &source,
            &index,
            &unmatched,
            &ProjectionOptions {
                unmatched_rows: UnmatchedRowPolicy::Error,
                ..OPTIONS
            },
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::UnmatchedIdentifier { identifier } if identifier == "99"));
    }

    #[test]
    fn extra_record_columns_get_values_without_styles() {
        let source = source();
        let mut set = RecordSet::new(vec!["ID".into(), "Name".into(), "Link".into(), "Notes".into()]);
        set.push_row(vec![CellValue::Number(42.0), text("Amy"), CellValue::Empty, text("late")]);

        let out = run(&source, &set, &OPTIONS);
        assert_eq!(out.cell(1, 4).unwrap().value, text("Notes"));
        assert_eq!(out.cell(1, 4).unwrap().style, None);
        assert_eq!(out.cell(2, 4).unwrap().value, text("late"));
        assert_eq!(out.cell(2, 4).unwrap().style, None);
    }

    #[test]
    fn header_hyperlinks_are_carried() {
        let mut source = source();
        source.set_hyperlink(1, 2, "https://example.com/guide");
        let out = run(&source, &records(Vec::new()), &OPTIONS);

        let header = out.cell(1, 2).unwrap();
        assert_eq!(header.value, text("Name"));
        assert_eq!(header.hyperlink.as_deref(), Some("https://example.com/guide"));
        assert!(header.hyperlink_style);
        assert_eq!(header.style, None);
        assert!(out.cell(1, 1).unwrap().style.is_some());
    }

    #[test]
    fn missing_identifier_column_fails() {
        let source = source();
        let index = IdentifierIndex::default();
        let err = project(
            &source,
            &index,
            &records(Vec::new()),
            &ProjectionOptions {
                identifier_column: "ADEK Applicant ID",
                ..OPTIONS
            },
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
