//! Cell formatting model and the `xl/styles.xml` parser.
//!
//! Styles are resolved per cell (`cellXfs` entry -> font/fill/border/alignment/number
//! format) with colours already converted to RGB, so the projector can copy them
//! attribute by attribute without holding on to the source package.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use rust_xlsxwriter::{
    FormatAlign, FormatBorder, FormatDiagonalBorder, FormatPattern, FormatScript, FormatUnderline,
};

use crate::theme::ThemePalette;
use crate::xml::{child, children, flag, parsed, toggle};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub font: Font,
    pub fill: Fill,
    pub border: Border,
    pub alignment: Alignment,
    pub number_format: NumberFormat,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Font {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: FormatUnderline,
    pub script: FormatScript,
    pub color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fill {
    pub pattern: FormatPattern,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BorderEdge {
    pub style: FormatBorder,
    pub color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Border {
    pub left: BorderEdge,
    pub right: BorderEdge,
    pub top: BorderEdge,
    pub bottom: BorderEdge,
    pub diagonal: BorderEdge,
    pub diagonal_type: FormatDiagonalBorder,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Alignment {
    pub horizontal: FormatAlign,
    pub vertical: Option<FormatAlign>,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    /// Degrees as written by Excel: 0-90 counter-clockwise, 91-180 clockwise, 255 stacked.
    pub rotation: u16,
    pub indent: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum NumberFormat {
    #[default]
    General,
    /// Built-in format id (1-163) without an explicit format code.
    Builtin(u16),
    Custom(String),
}

/// The `cellXfs` table of a workbook, resolved into `CellStyle`s.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    cell_styles: Vec<CellStyle>,
}

impl StyleSheet {
    pub fn parse(styles_xml: &str, palette: &ThemePalette) -> Result<Self, roxmltree::Error> {
        let doc = Document::parse(styles_xml)?;
        let root = doc.root_element();

        let num_fmts = parse_num_fmts(root);
        let fonts = child(root, "fonts")
            .map(|n| children(n, "font").map(|f| parse_font(f, palette)).collect())
            .unwrap_or_else(Vec::new);
        let fills = child(root, "fills")
            .map(|n| children(n, "fill").map(|f| parse_fill(f, palette)).collect())
            .unwrap_or_else(Vec::new);
        let borders = child(root, "borders")
            .map(|n| children(n, "border").map(|b| parse_border(b, palette)).collect())
            .unwrap_or_else(Vec::new);

        let cell_styles = child(root, "cellXfs")
            .map(|xfs| {
                children(xfs, "xf")
                    .map(|xf| {
                        let font = index_into(&fonts, xf, "fontId");
                        let fill = index_into(&fills, xf, "fillId");
                        let border = index_into(&borders, xf, "borderId");
                        CellStyle {
                            font,
                            fill,
                            border,
                            alignment: child(xf, "alignment")
                                .map(parse_alignment)
                                .unwrap_or_default(),
                            number_format: number_format(xf, &num_fmts),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { cell_styles })
    }

    /// Style for a cell's `s` attribute. Unknown indexes fall back to the default style.
    pub fn cell_style(&self, xf_index: usize) -> CellStyle {
        self.cell_styles
            .get(xf_index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.cell_styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_styles.is_empty()
    }
}

fn index_into<T: Clone + Default>(table: &[T], xf: Node<'_, '_>, attr: &str) -> T {
    parsed::<usize>(xf, attr)
        .and_then(|i| table.get(i).cloned())
        .unwrap_or_default()
}

fn parse_num_fmts(root: Node<'_, '_>) -> HashMap<u16, String> {
    let mut out = HashMap::new();
    let Some(num_fmts) = child(root, "numFmts") else {
        return out;
    };
    for num_fmt in children(num_fmts, "numFmt") {
        let id = parsed::<u16>(num_fmt, "numFmtId");
        let code = num_fmt.attribute("formatCode");
        if let (Some(id), Some(code)) = (id, code) {
            out.insert(id, code.to_string());
        }
    }
    out
}

fn number_format(xf: Node<'_, '_>, num_fmts: &HashMap<u16, String>) -> NumberFormat {
    match parsed::<u16>(xf, "numFmtId").unwrap_or(0) {
        0 => NumberFormat::General,
        id => match num_fmts.get(&id) {
            Some(code) => NumberFormat::Custom(code.clone()),
            None => NumberFormat::Builtin(id),
        },
    }
}

fn parse_font(el: Node<'_, '_>, palette: &ThemePalette) -> Font {
    let underline = match child(el, "u") {
        None => FormatUnderline::None,
        Some(u) => match u.attribute("val").unwrap_or("single") {
            "double" => FormatUnderline::Double,
            "singleAccounting" => FormatUnderline::SingleAccounting,
            "doubleAccounting" => FormatUnderline::DoubleAccounting,
            "none" => FormatUnderline::None,
            _ => FormatUnderline::Single,
        },
    };
    let script = match child(el, "vertAlign").and_then(|v| v.attribute("val")) {
        Some("superscript") => FormatScript::Superscript,
        Some("subscript") => FormatScript::Subscript,
        _ => FormatScript::None,
    };

    Font {
        name: child(el, "name")
            .and_then(|n| n.attribute("val"))
            .map(str::to_string),
        size: child(el, "sz").and_then(|n| parsed(n, "val")),
        bold: toggle(el, "b"),
        italic: toggle(el, "i"),
        strikethrough: toggle(el, "strike"),
        underline,
        script,
        color: child(el, "color").and_then(|c| palette.resolve(c)),
    }
}

fn parse_fill(el: Node<'_, '_>, palette: &ThemePalette) -> Fill {
    // Gradient fills have no equivalent in the output and keep the default.
    let Some(pattern_fill) = child(el, "patternFill") else {
        return Fill::default();
    };

    Fill {
        pattern: pattern_type(pattern_fill.attribute("patternType").unwrap_or("none")),
        foreground: child(pattern_fill, "fgColor").and_then(|c| palette.resolve(c)),
        background: child(pattern_fill, "bgColor").and_then(|c| palette.resolve(c)),
    }
}

fn pattern_type(value: &str) -> FormatPattern {
    match value {
        "solid" => FormatPattern::Solid,
        "mediumGray" => FormatPattern::MediumGray,
        "darkGray" => FormatPattern::DarkGray,
        "lightGray" => FormatPattern::LightGray,
        "darkHorizontal" => FormatPattern::DarkHorizontal,
        "darkVertical" => FormatPattern::DarkVertical,
        "darkDown" => FormatPattern::DarkDown,
        "darkUp" => FormatPattern::DarkUp,
        "darkGrid" => FormatPattern::DarkGrid,
        "darkTrellis" => FormatPattern::DarkTrellis,
        "lightHorizontal" => FormatPattern::LightHorizontal,
        "lightVertical" => FormatPattern::LightVertical,
        "lightDown" => FormatPattern::LightDown,
        "lightUp" => FormatPattern::LightUp,
        "lightGrid" => FormatPattern::LightGrid,
        "lightTrellis" => FormatPattern::LightTrellis,
        "gray125" => FormatPattern::Gray125,
        "gray0625" => FormatPattern::Gray0625,
        _ => FormatPattern::None,
    }
}

fn parse_border(el: Node<'_, '_>, palette: &ThemePalette) -> Border {
    let edge = |name: &str| {
        child(el, name)
            .map(|e| BorderEdge {
                style: border_style(e.attribute("style").unwrap_or("none")),
                color: child(e, "color").and_then(|c| palette.resolve(c)),
            })
            .unwrap_or_default()
    };

    let diagonal_type = match (flag(el, "diagonalUp"), flag(el, "diagonalDown")) {
        (true, true) => FormatDiagonalBorder::BorderUpDown,
        (true, false) => FormatDiagonalBorder::BorderUp,
        (false, true) => FormatDiagonalBorder::BorderDown,
        (false, false) => FormatDiagonalBorder::None,
    };

    Border {
        left: edge("left"),
        right: edge("right"),
        top: edge("top"),
        bottom: edge("bottom"),
        diagonal: edge("diagonal"),
        diagonal_type,
    }
}

fn border_style(value: &str) -> FormatBorder {
    match value {
        "thin" => FormatBorder::Thin,
        "medium" => FormatBorder::Medium,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "hair" => FormatBorder::Hair,
        "mediumDashed" => FormatBorder::MediumDashed,
        "dashDot" => FormatBorder::DashDot,
        "mediumDashDot" => FormatBorder::MediumDashDot,
        "dashDotDot" => FormatBorder::DashDotDot,
        "mediumDashDotDot" => FormatBorder::MediumDashDotDot,
        "slantDashDot" => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn parse_alignment(el: Node<'_, '_>) -> Alignment {
    let horizontal = match el.attribute("horizontal").unwrap_or("general") {
        "left" => FormatAlign::Left,
        "center" => FormatAlign::Center,
        "right" => FormatAlign::Right,
        "fill" => FormatAlign::Fill,
        "justify" => FormatAlign::Justify,
        "centerContinuous" => FormatAlign::CenterAcross,
        "distributed" => FormatAlign::Distributed,
        _ => FormatAlign::General,
    };
    // Bottom is Excel's default and is left unset.
    let vertical = match el.attribute("vertical") {
        Some("top") => Some(FormatAlign::Top),
        Some("center") => Some(FormatAlign::VerticalCenter),
        Some("justify") => Some(FormatAlign::VerticalJustify),
        Some("distributed") => Some(FormatAlign::VerticalDistributed),
        _ => None,
    };

    Alignment {
        horizontal,
        vertical,
        wrap_text: flag(el, "wrapText"),
        shrink_to_fit: flag(el, "shrinkToFit"),
        rotation: parsed(el, "textRotation").unwrap_or(0),
        indent: parsed(el, "indent").unwrap_or(0),
    }
}
