use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // Column names in the roster header
    pub identifier_column: String,
    pub link_column: String,
    pub primary_group_column: String,
    pub secondary_group_column: String,
    // Output naming
    pub period_label: String,
    pub sheet_name: String,
    pub archive_name: String,
    pub output_directory: String,
    pub unmatched_rows: UnmatchedRowPolicy,
}

/// What the projector does with a record whose identifier is not in the source sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UnmatchedRowPolicy {
    /// Borrow the formatting of source row 2 (row 1 for header-only sheets).
    #[default]
    #[serde(rename = "template")]
    TemplateRow,
    #[serde(rename = "default")]
    DefaultFormat,
    #[serde(rename = "error")]
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identifier_column: "ADEK Applicant ID".to_string(),
            link_column: "Microsoft Form Link".to_string(),
            primary_group_column: "Team Lead".to_string(),
            secondary_group_column: "Current Mentor".to_string(),
            period_label: "January 2026".to_string(),
            sheet_name: "Students".to_string(),
            archive_name: "Formatted_Mentor_Files.zip".to_string(),
            output_directory: "output".to_string(),
            unmatched_rows: UnmatchedRowPolicy::TemplateRow,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// A single cell value as read from either the styled sheet or the dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Excel serial date; rendered through the cell's number format.
    DateTime(f64),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Lookup key used to match identifiers between the dataset and the styled sheet.
    pub fn key_string(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// True when the value is text starting with an http(s) scheme.
    pub fn is_web_link(&self) -> bool {
        self.as_text()
            .is_some_and(|text| text.starts_with("http://") || text.starts_with("https://"))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) | CellValue::DateTime(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::Error(code) => f.write_str(code),
        }
    }
}

/// Integral floats print without a fractional part so `42.0` and `42` give the same key.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
