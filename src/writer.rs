//! Serialization of projected workbooks to xlsx bytes.

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern, Workbook, Worksheet};
use tracing::{debug, warn};

use crate::error::{best_effort, Result};
use crate::models::CellValue;
use crate::projector::{OutputCell, OutputWorkbook};
use crate::style::{BorderEdge, CellStyle, NumberFormat};

/// Excel's `m/d/yy h:mm`, used for dates that arrive without a number format.
const DEFAULT_DATETIME_FORMAT: u8 = 22;

/// Render `workbook` as an xlsx file in memory.
pub fn write_workbook(workbook: &OutputWorkbook) -> Result<Vec<u8>> {
    let mut book = Workbook::new();
    let sheet = book.add_worksheet();
    sheet.set_name(workbook.sheet_name.as_str())?;

    for (column, width) in workbook.column_widths() {
        let Some(column) = column.checked_sub(1) else {
            continue;
        };
        best_effort("column width", || {
            sheet.set_column_width(column, character_width(width))?;
            Ok(())
        });
    }
    for (row, height) in workbook.row_heights() {
        let Some(row) = row.checked_sub(1) else {
            continue;
        };
        best_effort("row height", || {
            sheet.set_row_height(row, height)?;
            Ok(())
        });
    }

    for (r, cells) in workbook.rows().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            let (Ok(row), Ok(column)) = (u32::try_from(r), u16::try_from(c)) else {
                continue;
            };
            write_cell(sheet, row, column, cell)?;
        }
    }

    let bytes = book.save_to_buffer()?;
    debug!(
        rows = workbook.row_count(),
        bytes = bytes.len(),
        "serialized workbook"
    );
    Ok(bytes)
}

fn write_cell(sheet: &mut Worksheet, row: u32, column: u16, cell: &OutputCell) -> Result<()> {
    let format = cell.style.as_ref().map(to_format).unwrap_or_default();

    if let Some(link) = &cell.hyperlink {
        let link_format = if cell.hyperlink_style {
            Format::new().set_hyperlink()
        } else {
            format.clone()
        };
        let text = cell.value.to_string();
        let written = best_effort("hyperlink", || {
            sheet.write_url_with_options(row, column, link.as_str(), text.as_str(), "", Some(&link_format))?;
            Ok(())
        });
        if written.is_some() {
            return Ok(());
        }
        warn!(row = row + 1, column = column + 1, %link, "hyperlink rejected, writing plain value");
    }

    match &cell.value {
        CellValue::Empty => {
            if cell.style.is_some() {
                sheet.write_blank(row, column, &format)?;
            }
        }
        CellValue::Number(n) => {
            sheet.write_number_with_format(row, column, *n, &format)?;
        }
        CellValue::DateTime(serial) => {
            let format = match cell.style.as_ref().map(|s| &s.number_format) {
                None | Some(NumberFormat::General) => {
                    format.set_num_format_index(DEFAULT_DATETIME_FORMAT)
                }
                Some(_) => format,
            };
            sheet.write_number_with_format(row, column, *serial, &format)?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean_with_format(row, column, *b, &format)?;
        }
        CellValue::Text(s) | CellValue::Error(s) => {
            sheet.write_string_with_format(row, column, s.as_str(), &format)?;
        }
    }
    Ok(())
}

/// Convert a stored `<col width>` into the character width the writer expects.
///
/// Stored widths include the cell padding; the writer adds it back.
fn character_width(stored: f64) -> f64 {
    let pixels = (stored * 7.0).round();
    if pixels < 12.0 {
        pixels / 12.0
    } else {
        (pixels - 5.0) / 7.0
    }
}

/// Excel text rotation (0-90, 91-180 clockwise, 255 stacked) to the writer's angle.
fn rotation_angle(rotation: u16) -> Option<i16> {
    match rotation {
        0 => None,
        1..=90 => Some(rotation as i16),
        91..=180 => Some(90 - rotation as i16),
        255 => Some(270),
        _ => None,
    }
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    let font = &style.font;
    if let Some(name) = &font.name {
        format = format.set_font_name(name.as_str());
    }
    if let Some(size) = font.size {
        format = format.set_font_size(size);
    }
    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if font.strikethrough {
        format = format.set_font_strikethrough();
    }
    format = format
        .set_underline(font.underline)
        .set_font_script(font.script);
    if let Some(color) = font.color {
        format = format.set_font_color(Color::RGB(color));
    }

    let fill = &style.fill;
    match fill.pattern {
        FormatPattern::None => {}
        FormatPattern::Solid => {
            format = format.set_pattern(FormatPattern::Solid);
            if let Some(color) = fill.foreground {
                format = format.set_background_color(Color::RGB(color));
            }
        }
        pattern => {
            format = format.set_pattern(pattern);
            if let Some(color) = fill.foreground {
                format = format.set_foreground_color(Color::RGB(color));
            }
            if let Some(color) = fill.background {
                format = format.set_background_color(Color::RGB(color));
            }
        }
    }

    let border = &style.border;
    format = border_edge(format, border.left, Format::set_border_left, |f, c| {
        f.set_border_left_color(c)
    });
    format = border_edge(format, border.right, Format::set_border_right, |f, c| {
        f.set_border_right_color(c)
    });
    format = border_edge(format, border.top, Format::set_border_top, |f, c| {
        f.set_border_top_color(c)
    });
    format = border_edge(format, border.bottom, Format::set_border_bottom, |f, c| {
        f.set_border_bottom_color(c)
    });
    format = border_edge(format, border.diagonal, Format::set_border_diagonal, |f, c| {
        f.set_border_diagonal_color(c)
    });
    format = format.set_border_diagonal_type(border.diagonal_type);

    let alignment = &style.alignment;
    if alignment.horizontal != FormatAlign::General {
        format = format.set_align(alignment.horizontal);
    }
    if let Some(vertical) = alignment.vertical {
        format = format.set_align(vertical);
    }
    if alignment.wrap_text {
        format = format.set_text_wrap();
    }
    if alignment.shrink_to_fit {
        format = format.set_shrink();
    }
    if alignment.indent > 0 {
        format = format.set_indent(alignment.indent);
    }
    if let Some(angle) = rotation_angle(alignment.rotation) {
        format = format.set_rotation(angle);
    }

    match &style.number_format {
        NumberFormat::General => {}
        NumberFormat::Builtin(id) => match u8::try_from(*id) {
            Ok(id) if id < 164 => format = format.set_num_format_index(id),
            _ => debug!(id, "unknown built-in number format"),
        },
        NumberFormat::Custom(code) => format = format.set_num_format(code.as_str()),
    }

    format
}

fn border_edge(
    format: Format,
    edge: BorderEdge,
    set_style: impl FnOnce(Format, FormatBorder) -> Format,
    set_color: impl FnOnce(Format, Color) -> Format,
) -> Format {
    if edge.style == FormatBorder::None {
        return format;
    }
    let format = set_style(format, edge.style);
    match edge.color {
        Some(color) => set_color(format, Color::RGB(color)),
        None => format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RecordSet;
    use crate::index::build_index;
    use crate::models::UnmatchedRowPolicy;
    use crate::projector::{project, ProjectionOptions};
    use crate::reader::WorkbookReader;
    use crate::sheet::{SourceCell, SourceSheet};
    use crate::style::{Alignment, Border, Fill, Font};
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::FormatUnderline;

    #[test]
    fn widths_convert_back_to_characters() {
        // rust_xlsxwriter stores 8.43 characters as 9.140625.
        assert!((character_width(9.140625) - 8.43).abs() < 0.01);
        assert!((character_width(24.7109375) - 24.0).abs() < 0.01);
        assert!((character_width(1.0) - 7.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn rotations_map_to_signed_angles() {
        assert_eq!(rotation_angle(0), None);
        assert_eq!(rotation_angle(45), Some(45));
        assert_eq!(rotation_angle(90), Some(90));
        assert_eq!(rotation_angle(135), Some(-45));
        assert_eq!(rotation_angle(180), Some(-90));
        assert_eq!(rotation_angle(255), Some(270));
        assert_eq!(rotation_angle(200), None);
    }

    #[test]
    fn styles_translate_to_formats() {
        let style = CellStyle {
            font: Font {
                name: Some("Arial".into()),
                size: Some(12.0),
                bold: true,
                underline: FormatUnderline::Double,
                color: Some(0x336699),
                ..Font::default()
            },
            fill: Fill {
                pattern: FormatPattern::Solid,
                foreground: Some(0xFFFF00),
                background: None,
            },
            border: Border {
                bottom: BorderEdge {
                    style: FormatBorder::Thick,
                    color: Some(0x000000),
                },
                ..Border::default()
            },
            alignment: Alignment {
                horizontal: FormatAlign::Center,
                wrap_text: true,
                ..Alignment::default()
            },
            number_format: NumberFormat::Custom("0.00%".into()),
        };

        let expected = Format::new()
            .set_font_name("Arial")
            .set_font_size(12.0)
            .set_bold()
            .set_underline(FormatUnderline::Double)
            .set_font_color(Color::RGB(0x336699))
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(0xFFFF00))
            .set_border_bottom(FormatBorder::Thick)
            .set_border_bottom_color(Color::RGB(0x000000))
            .set_align(FormatAlign::Center)
            .set_text_wrap()
            .set_num_format("0.00%");

        assert_eq!(to_format(&style), expected);
    }

    #[test]
    fn default_style_is_the_default_format() {
        assert_eq!(to_format(&CellStyle::default()), Format::new());
    }

    fn linked_roster(target: &str) -> OutputWorkbook {
        let header = |name: &str| SourceCell {
            value: CellValue::Text(name.to_string()),
            ..SourceCell::default()
        };
        let mut source = SourceSheet::new("Roster");
        source.set_cell(1, 1, header("ID"));
        source.set_cell(1, 2, header("Link"));
        let red = CellStyle {
            fill: Fill {
                pattern: FormatPattern::Solid,
                foreground: Some(0xFFC7CE),
                background: None,
            },
            ..CellStyle::default()
        };
        source.set_cell(
            2,
            1,
            SourceCell {
                value: CellValue::Number(42.0),
                style: red.clone(),
                ..SourceCell::default()
            },
        );
        source.set_cell(
            2,
            2,
            SourceCell {
                value: CellValue::Text("Open form".into()),
                style: red,
                ..SourceCell::default()
            },
        );
        source.set_hyperlink(2, 2, target);

        let mut records = RecordSet::new(vec!["ID".into(), "Link".into()]);
        records.push_row(vec![CellValue::Number(42.0), CellValue::Text("Open form".into())]);

        let index = build_index(&source, "ID").unwrap();
        let options = ProjectionOptions {
            identifier_column: "ID",
            link_column: "Link",
            sheet_name: "Students",
            unmatched_rows: UnmatchedRowPolicy::TemplateRow,
        };
        project(&source, &index, &records, &options).unwrap()
    }

    fn read_back(bytes: &[u8]) -> SourceSheet {
        WorkbookReader::new(bytes).unwrap().read_first_sheet().unwrap()
    }

    #[test]
    fn linked_cells_use_only_the_hyperlink_style() {
        let bytes = write_workbook(&linked_roster("https://forms.example.com/42")).unwrap();
        let sheet = read_back(&bytes);

        let link = sheet.cell(2, 2).unwrap();
        assert_eq!(link.hyperlink.as_deref(), Some("https://forms.example.com/42"));
        assert_eq!(link.style.fill.pattern, FormatPattern::None);
        assert_eq!(link.style.font.underline, FormatUnderline::Single);
        assert_eq!(sheet.cell(2, 1).unwrap().style.fill.foreground, Some(0xFFC7CE));
    }

    #[test]
    fn rejected_links_fall_back_to_the_plain_value() {
        let target = format!("https://forms.example.com/{}", "a".repeat(2100));
        let bytes = write_workbook(&linked_roster(&target)).unwrap();
        let sheet = read_back(&bytes);

        let link = sheet.cell(2, 2).unwrap();
        assert_eq!(link.value, CellValue::Text("42".into()));
        assert_eq!(link.hyperlink, None);
    }
}
