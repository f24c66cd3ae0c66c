use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use roxmltree::{Document, Node};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Result, SplitError};
use crate::models::CellValue;
use crate::sheet::{SourceCell, SourceSheet};
use crate::style::StyleSheet;
use crate::theme::ThemePalette;
use crate::xml::{child, children, descendant, namespaced_attribute, parsed, run_text};

const REL_WORKSHEET: &str = "/worksheet";
const REL_SHARED_STRINGS: &str = "/sharedStrings";
const REL_STYLES: &str = "/styles";
const REL_THEME: &str = "/theme";
const REL_HYPERLINK: &str = "/hyperlink";

/// Spreadsheet file extensions accepted for input, lowercase.
///
/// Outputs reuse the input extension and are always plain xlsx packages, so
/// macro-enabled formats are not accepted.
pub const SUPPORTED_EXTENSIONS: [&str; 1] = ["xlsx"];

#[derive(Debug, Clone)]
struct Relationship {
    ty: String,
    target: String,
}

/// Reads the first worksheet of an OOXML workbook, keeping formatting and hyperlinks.
pub struct WorkbookReader<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> WorkbookReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(bytes))?,
        })
    }

    pub fn read_first_sheet(&mut self) -> Result<SourceSheet> {
        let workbook_xml = self
            .read_part("xl/workbook.xml")?
            .ok_or_else(|| SplitError::malformed("xl/workbook.xml", "part is missing"))?;
        let workbook_rels = match self.read_part("xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let (sheet_name, sheet_path) = first_sheet(&workbook_xml, &workbook_rels)?;
        debug!(sheet = %sheet_name, part = %sheet_path, "reading first worksheet");

        let palette = match self.read_related(&workbook_rels, REL_THEME, None)? {
            Some(xml) => ThemePalette::parse(&xml)?,
            None => ThemePalette::default(),
        };
        let styles = match self.read_related(&workbook_rels, REL_STYLES, Some("xl/styles.xml"))? {
            Some(xml) => StyleSheet::parse(&xml, &palette)?,
            None => StyleSheet::default(),
        };
        let shared_strings = match self.read_related(
            &workbook_rels,
            REL_SHARED_STRINGS,
            Some("xl/sharedStrings.xml"),
        )? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        let sheet_xml = self
            .read_part(&sheet_path)?
            .ok_or_else(|| SplitError::malformed(&sheet_path, "worksheet part is missing"))?;
        let sheet_rels = match self.read_part(&rels_path_for(&sheet_path))? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let mut sheet = SourceSheet::new(sheet_name);
        let doc = Document::parse(&sheet_xml)?;
        let root = doc.root_element();

        read_columns(root, &mut sheet);
        read_rows(root, &styles, &shared_strings, &mut sheet)?;
        read_hyperlinks(root, &sheet_rels, &mut sheet);

        Ok(sheet)
    }

    fn read_related(
        &mut self,
        rels: &HashMap<String, Relationship>,
        type_suffix: &str,
        fallback: Option<&str>,
    ) -> Result<Option<String>> {
        let path = rels
            .values()
            .find(|rel| rel.ty.ends_with(type_suffix))
            .map(|rel| resolve_target("xl", &rel.target))
            .or_else(|| fallback.map(str::to_string));

        match path {
            Some(path) => self.read_part(&path),
            None => Ok(None),
        }
    }

    fn read_part(&mut self, name: &str) -> Result<Option<String>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(Some(content))
    }
}

/// Read the first sheet of the workbook at `path`.
pub fn read_source_sheet(path: &Path) -> Result<SourceSheet> {
    check_extension(path)?;
    let bytes = std::fs::read(path)?;
    WorkbookReader::new(&bytes)?.read_first_sheet()
}

/// Lowercased extension of `path`, rejecting formats the reader cannot load.
pub fn check_extension(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    supported_extension(ext).map_err(|_| SplitError::UnsupportedFormat(path.display().to_string()))
}

/// Lowercased `extension` when it is in [`SUPPORTED_EXTENSIONS`].
pub fn supported_extension(extension: &str) -> Result<String> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(SplitError::UnsupportedFormat(extension.to_string()))
    }
}

fn first_sheet(
    workbook_xml: &str,
    rels: &HashMap<String, Relationship>,
) -> Result<(String, String)> {
    let doc = Document::parse(workbook_xml)?;
    let sheet = descendant(doc.root_element(), "sheets")
        .and_then(|sheets| children(sheets, "sheet").next())
        .ok_or(SplitError::NoWorksheet)?;

    let name = sheet.attribute("name").unwrap_or("Sheet1").to_string();
    let path = namespaced_attribute(sheet, "id")
        .and_then(|id| rels.get(id))
        .filter(|rel| rel.ty.ends_with(REL_WORKSHEET))
        .map(|rel| resolve_target("xl", &rel.target))
        .unwrap_or_else(|| "xl/worksheets/sheet1.xml".to_string());

    Ok((name, path))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, Relationship>> {
    let doc = Document::parse(xml)?;
    let mut rels = HashMap::new();
    for rel in children(doc.root_element(), "Relationship") {
        let Some(id) = rel.attribute("Id") else {
            continue;
        };
        rels.insert(
            id.to_string(),
            Relationship {
                ty: rel.attribute("Type").unwrap_or_default().to_string(),
                target: rel.attribute("Target").unwrap_or_default().to_string(),
            },
        );
    }
    Ok(rels)
}

/// Package path for a relationship target relative to `base_dir`.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml)?;
    Ok(children(doc.root_element(), "si").map(run_text).collect())
}

fn read_columns(root: Node<'_, '_>, sheet: &mut SourceSheet) {
    let Some(cols) = child(root, "cols") else {
        return;
    };
    for col in children(cols, "col") {
        let (Some(min), Some(width)) = (parsed::<u16>(col, "min"), parsed::<f64>(col, "width"))
        else {
            continue;
        };
        // Ranges often run to the last column of the grid; only keep what can hold data.
        let max = parsed::<u16>(col, "max").unwrap_or(min).min(min.saturating_add(255));
        for column in min..=max {
            sheet.set_column_width(column, width);
        }
    }
}

fn read_rows(
    root: Node<'_, '_>,
    styles: &StyleSheet,
    shared_strings: &[String],
    sheet: &mut SourceSheet,
) -> Result<()> {
    let Some(sheet_data) = child(root, "sheetData") else {
        return Ok(());
    };

    let mut next_row = 1u32;
    for row in children(sheet_data, "row") {
        let row_number = parsed::<u32>(row, "r").unwrap_or(next_row);
        next_row = row_number + 1;

        if let Some(height) = parsed::<f64>(row, "ht") {
            sheet.set_row_height(row_number, height);
        }

        let mut next_column = 1u16;
        for c in children(row, "c") {
            let column = match c.attribute("r") {
                Some(reference) => {
                    let (_, column) = parse_cell_ref(reference).ok_or_else(|| {
                        SplitError::malformed(&sheet.name, format!("bad cell reference {reference}"))
                    })?;
                    column
                }
                None => next_column,
            };
            next_column = column + 1;

            let style = parsed::<usize>(c, "s")
                .map(|xf| styles.cell_style(xf))
                .unwrap_or_else(|| styles.cell_style(0));
            sheet.set_cell(
                row_number,
                column,
                SourceCell {
                    value: cell_value(c, shared_strings),
                    style,
                    ..SourceCell::default()
                },
            );
        }
    }
    Ok(())
}

fn cell_value(c: Node<'_, '_>, shared_strings: &[String]) -> CellValue {
    let raw = child(c, "v").and_then(|v| v.text());
    match c.attribute("t").unwrap_or("n") {
        "s" => raw
            .and_then(|i| i.trim().parse::<usize>().ok())
            .and_then(|i| shared_strings.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or_default(),
        "inlineStr" => child(c, "is")
            .map(|is| CellValue::Text(run_text(is)))
            .unwrap_or_default(),
        "str" | "d" => raw
            .map(|s| CellValue::Text(s.to_string()))
            .unwrap_or_default(),
        "b" => raw
            .map(|s| CellValue::Bool(s.trim() == "1"))
            .unwrap_or_default(),
        "e" => raw
            .map(|s| CellValue::Error(s.to_string()))
            .unwrap_or_default(),
        _ => match raw {
            Some(s) => s
                .trim()
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or_else(|_| CellValue::Text(s.to_string())),
            None => CellValue::Empty,
        },
    }
}

fn read_hyperlinks(
    root: Node<'_, '_>,
    rels: &HashMap<String, Relationship>,
    sheet: &mut SourceSheet,
) {
    let Some(hyperlinks) = child(root, "hyperlinks") else {
        return;
    };
    for link in children(hyperlinks, "hyperlink") {
        let Some(reference) = link.attribute("ref") else {
            continue;
        };
        let target = namespaced_attribute(link, "id")
            .and_then(|id| rels.get(id))
            .filter(|rel| rel.ty.ends_with(REL_HYPERLINK))
            .map(|rel| match link.attribute("location") {
                Some(location) => format!("{}#{location}", rel.target),
                None => rel.target.clone(),
            });

        let Some(((first_row, first_col), (last_row, last_col))) = parse_range(reference) else {
            debug!(cell = reference, "skipping hyperlink with bad reference");
            continue;
        };
        if target.is_none() {
            debug!(cell = reference, "hyperlink without external target");
        }
        for row in first_row..=last_row {
            for column in first_col..=last_col {
                match &target {
                    Some(target) => sheet.set_hyperlink(row, column, target.clone()),
                    // In-workbook links (location only) have no target URI to carry over.
                    None => sheet.mark_internal_link(row, column),
                }
            }
        }
    }
}

/// `"AB12"` -> `(12, 28)`, 1-based, absolute markers allowed.
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u16)> {
    let reference = reference.trim().replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut column = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row = digits.parse::<u32>().ok().filter(|r| *r > 0)?;
    Some((row, u16::try_from(column).ok()?))
}

fn parse_range(reference: &str) -> Option<((u32, u16), (u32, u16))> {
    match reference.split_once(':') {
        Some((start, end)) => {
            let start = parse_cell_ref(start)?;
            let end = parse_cell_ref(end)?;
            Some((
                (start.0.min(end.0), start.1.min(end.1)),
                (start.0.max(end.0), start.1.max(end.1)),
            ))
        }
        None => {
            let cell = parse_cell_ref(reference)?;
            Some((cell, cell))
        }
    }
}
