//! Colour resolution for workbook styles.
//!
//! Styles reference colours as explicit ARGB values, theme slots with an optional
//! tint, or entries of the legacy indexed palette. Output formats only take RGB,
//! so everything is resolved against the source workbook's theme while reading.

use roxmltree::{Document, Node};

/// Palette extracted from `xl/theme/theme1.xml`, as RGB (`0xRRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePalette {
    pub dk1: u32,
    pub lt1: u32,
    pub dk2: u32,
    pub lt2: u32,
    pub accents: [u32; 6],
    pub hlink: u32,
    pub followed_hlink: u32,
}

impl Default for ThemePalette {
    fn default() -> Self {
        // Office 2013+ defaults, used when the package carries no theme part.
        Self {
            dk1: 0x000000,
            lt1: 0xFFFFFF,
            dk2: 0x44546A,
            lt2: 0xE7E6E6,
            accents: [0x4472C4, 0xED7D31, 0xA5A5A5, 0xFFC000, 0x5B9BD5, 0x70AD47],
            hlink: 0x0563C1,
            followed_hlink: 0x954F72,
        }
    }
}

impl ThemePalette {
    pub fn parse(theme_xml: &str) -> Result<Self, roxmltree::Error> {
        let doc = Document::parse(theme_xml)?;
        let mut palette = Self::default();

        let Some(scheme) = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "clrScheme")
        else {
            return Ok(palette);
        };

        let assign = |slot: &mut u32, name: &str| {
            if let Some(color) = scheme_entry(scheme, name) {
                *slot = color;
            }
        };
        assign(&mut palette.dk1, "dk1");
        assign(&mut palette.lt1, "lt1");
        assign(&mut palette.dk2, "dk2");
        assign(&mut palette.lt2, "lt2");
        for (i, slot) in palette.accents.iter_mut().enumerate() {
            assign(slot, &format!("accent{}", i + 1));
        }
        assign(&mut palette.hlink, "hlink");
        assign(&mut palette.followed_hlink, "folHlink");

        Ok(palette)
    }

    /// Colour for a `theme="n"` attribute. Excel swaps the dark/light pairs
    /// relative to their order in the scheme.
    pub fn theme_color(&self, index: u32) -> Option<u32> {
        match index {
            0 => Some(self.lt1),
            1 => Some(self.dk1),
            2 => Some(self.lt2),
            3 => Some(self.dk2),
            4..=9 => Some(self.accents[(index - 4) as usize]),
            10 => Some(self.hlink),
            11 => Some(self.followed_hlink),
            _ => None,
        }
    }

    /// Resolve a SpreadsheetML `<color>`-style element to RGB.
    /// `auto` colours and unknown references resolve to `None` (keep the default).
    pub fn resolve(&self, node: Node<'_, '_>) -> Option<u32> {
        if node.attribute("auto").is_some_and(|v| v == "1" || v == "true") {
            return None;
        }

        let base = if let Some(rgb) = node.attribute("rgb") {
            parse_argb(rgb)?
        } else if let Some(theme) = node.attribute("theme") {
            self.theme_color(theme.parse().ok()?)?
        } else if let Some(indexed) = node.attribute("indexed") {
            indexed_color(indexed.parse().ok()?)?
        } else {
            return None;
        };

        let tint = node
            .attribute("tint")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        Some(apply_tint(base, tint))
    }
}

fn scheme_entry(scheme: Node<'_, '_>, name: &str) -> Option<u32> {
    let entry = scheme
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)?;
    let clr = entry.children().find(|n| n.is_element())?;

    match clr.tag_name().name() {
        "srgbClr" => clr.attribute("val").and_then(parse_argb),
        "sysClr" => clr.attribute("lastClr").and_then(parse_argb).or_else(|| {
            match clr.attribute("val")? {
                "windowText" => Some(0x000000),
                "window" => Some(0xFFFFFF),
                _ => None,
            }
        }),
        _ => None,
    }
}

/// Parse `RRGGBB` or `AARRGGBB`, dropping alpha.
pub fn parse_argb(value: &str) -> Option<u32> {
    let hex = value.trim().trim_start_matches('#');
    match hex.len() {
        6 | 8 => u32::from_str_radix(hex, 16).ok().map(|v| v & 0x00FF_FFFF),
        _ => None,
    }
}

/// Excel tint: negative darkens towards black, positive lightens towards white.
pub fn apply_tint(rgb: u32, tint: f64) -> u32 {
    if tint == 0.0 {
        return rgb;
    }
    let tint = tint.clamp(-1.0, 1.0);

    let channel = |shift: u32| {
        let c = ((rgb >> shift) & 0xFF) as f64;
        let adjusted = if tint < 0.0 {
            c * (1.0 + tint)
        } else {
            c * (1.0 - tint) + 255.0 * tint
        };
        (adjusted.round().clamp(0.0, 255.0) as u32) << shift
    };

    channel(16) | channel(8) | channel(0)
}

const INDEXED_PALETTE: [u32; 64] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333,
];

/// Legacy indexed palette. 64 and 65 are the system foreground/background
/// and resolve to `None`.
pub fn indexed_color(index: usize) -> Option<u32> {
    INDEXED_PALETTE.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_palette_from_theme_xml() {
        let theme = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">
  <a:themeElements>
    <a:clrScheme name="Office">
      <a:dk1><a:sysClr val="windowText" lastClr="111111"/></a:dk1>
      <a:lt1><a:sysClr val="window"/></a:lt1>
      <a:dk2><a:srgbClr val="222222"/></a:dk2>
      <a:lt2><a:srgbClr val="DDDDDD"/></a:lt2>
      <a:accent1><a:srgbClr val="010203"/></a:accent1>
      <a:accent6><a:srgbClr val="101112"/></a:accent6>
      <a:hlink><a:srgbClr val="131415"/></a:hlink>
    </a:clrScheme>
  </a:themeElements>
</a:theme>"#;

        let palette = ThemePalette::parse(theme).unwrap();
        assert_eq!(palette.dk1, 0x111111);
        assert_eq!(palette.lt1, 0xFFFFFF);
        assert_eq!(palette.theme_color(0), Some(0xFFFFFF));
        assert_eq!(palette.theme_color(1), Some(0x111111));
        assert_eq!(palette.theme_color(3), Some(0x222222));
        assert_eq!(palette.theme_color(4), Some(0x010203));
        assert_eq!(palette.theme_color(9), Some(0x101112));
        assert_eq!(palette.theme_color(10), Some(0x131415));
        // accent2 missing from the scheme keeps the default
        assert_eq!(palette.theme_color(5), Some(0xED7D31));
        assert_eq!(palette.theme_color(12), None);
    }

    #[test]
    fn tint_lightens_and_darkens() {
        assert_eq!(apply_tint(0x0000FF, 0.0), 0x0000FF);
        assert_eq!(apply_tint(0x0000FF, -0.5), 0x000080);
        assert_eq!(apply_tint(0x0000FF, 0.5), 0x8080FF);
        assert_eq!(apply_tint(0x0000FF, -1.0), 0x000000);
        assert_eq!(apply_tint(0x0000FF, 1.0), 0xFFFFFF);
    }

    #[test]
    fn resolves_color_elements() {
        let xml = r#"<colors>
            <color rgb="FFFF0000"/>
            <color theme="4" tint="-0.5"/>
            <color indexed="10"/>
            <color indexed="64"/>
            <color auto="1"/>
        </colors>"#;
        let doc = Document::parse(xml).unwrap();
        let palette = ThemePalette::default();
        let resolved: Vec<Option<u32>> = doc
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .map(|n| palette.resolve(n))
            .collect();

        assert_eq!(
            resolved,
            vec![
                Some(0xFF0000),
                Some(apply_tint(0x4472C4, -0.5)),
                Some(0xFF0000),
                None,
                None
            ]
        );
    }
}
