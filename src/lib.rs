//! Split a roster workbook into per-mentor workbooks that keep the source
//! formatting and form hyperlinks.
//!
//! The core is two free functions over plain data: [`build_index`] maps each
//! identifier to its source row and [`project`] builds a formatted workbook for
//! a filtered record set. [`Session`] wires them to file loading, grouping and
//! archive production.

pub mod archive;
pub mod dataset;
pub mod error;
pub mod groups;
pub mod index;
pub mod models;
pub mod projector;
pub mod reader;
pub mod session;
pub mod sheet;
pub mod style;
pub mod theme;
pub mod writer;
mod xml;

pub use archive::{build_archive, ArchiveReport};
pub use dataset::{load_records, read_records, Record, RecordSet};
pub use error::{GroupBuildError, Result, SplitError, StyleCopyWarning};
pub use groups::{GroupFilter, ALL_GROUPS};
pub use index::{build_index, IdentifierIndex};
pub use models::{CellValue, Config, UnmatchedRowPolicy};
pub use projector::{project, OutputCell, OutputWorkbook, ProjectionOptions};
pub use reader::{read_source_sheet, WorkbookReader};
pub use session::Session;
pub use sheet::{SourceCell, SourceSheet};
pub use style::CellStyle;
pub use writer::write_workbook;
