use thiserror::Error;

pub type Result<T> = std::result::Result<T, SplitError>;

#[derive(Debug, Error)]
pub enum SplitError {
    /// A configured column is not present in the sheet header.
    #[error("column '{column}' not found in the sheet header")]
    MissingColumn { column: String },

    #[error("required columns missing: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("identifier '{identifier}' has no matching row in the source sheet")]
    UnmatchedIdentifier { identifier: String },

    #[error("workbook contains no worksheets")]
    NoWorksheet,

    #[error("unsupported spreadsheet format '{0}', expected .xlsx")]
    UnsupportedFormat(String),

    #[error("malformed workbook part {part}: {message}")]
    Malformed { part: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Dataset(#[from] calamine::XlsxError),

    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl SplitError {
    pub(crate) fn malformed(part: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            part: part.to_string(),
            message: message.into(),
        }
    }

    /// True for errors caused by the configured column names not matching the input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::MissingColumns { .. }
        )
    }
}

/// Non-fatal failure while copying formatting. Never escapes the projector or writer.
#[derive(Debug, Error)]
pub enum StyleCopyWarning {
    #[error("source cell ({row}, {column}) does not exist")]
    MissingCell { row: u32, column: u16 },

    #[error("source row {0} has no height")]
    MissingRowHeight(u32),

    #[error(transparent)]
    Writer(#[from] rust_xlsxwriter::XlsxError),
}

/// Run a formatting step, logging and discarding any failure.
pub(crate) fn best_effort<T>(
    what: &str,
    op: impl FnOnce() -> std::result::Result<T, StyleCopyWarning>,
) -> Option<T> {
    match op() {
        Ok(value) => Some(value),
        Err(warning) => {
            tracing::debug!(step = what, %warning, "formatting skipped");
            None
        }
    }
}

/// Failure to build one group's workbook during archive production.
#[derive(Debug, Error)]
#[error("Failed to build file for {group}: {source}")]
pub struct GroupBuildError {
    pub group: String,
    #[source]
    pub source: SplitError,
}
