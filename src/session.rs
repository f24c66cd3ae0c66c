//! One loaded roster file and the operations run against it.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveReport};
use crate::dataset::{load_records, RecordSet};
use crate::error::{Result, SplitError};
use crate::groups::{distinct_values, filter_primary, require_columns, select_group, GroupFilter};
use crate::index::{build_index, IdentifierIndex};
use crate::models::Config;
use crate::projector::{project, OutputWorkbook, ProjectionOptions};
use crate::reader::{check_extension, supported_extension, WorkbookReader};
use crate::sheet::SourceSheet;
use crate::writer::write_workbook;

/// A roster loaded once: styled sheet, identifier index and dataset.
///
/// Everything here is read-only after `open`; group builds borrow it.
#[derive(Debug)]
pub struct Session {
    config: Config,
    extension: String,
    source: SourceSheet,
    /// `None` when the identifier column is missing; builds then fail per group.
    index: Option<IdentifierIndex>,
    records: RecordSet,
}

impl Session {
    pub fn open(path: &Path, config: Config) -> Result<Self> {
        let extension = check_extension(path)?;
        let bytes = std::fs::read(path)?;
        info!(file = %path.display(), bytes = bytes.len(), "loaded roster");
        Self::from_bytes(&bytes, &extension, config)
    }

    /// Load a roster from memory; `extension` names the output file format.
    pub fn from_bytes(bytes: &[u8], extension: &str, config: Config) -> Result<Self> {
        let extension = supported_extension(extension)?;
        let source = WorkbookReader::new(bytes)?.read_first_sheet()?;
        let records = load_records(bytes)?;

        require_columns(
            &records,
            &[
                config.secondary_group_column.as_str(),
                config.primary_group_column.as_str(),
            ],
        )?;

        let index = match build_index(&source, &config.identifier_column) {
            Ok(index) => Some(index),
            Err(err) if err.is_configuration() => {
                warn!(%err, "formatted output unavailable");
                None
            }
            Err(err) => return Err(err),
        };

        debug!(
            sheet = %source.name,
            rows = records.len(),
            indexed = index.as_ref().map_or(0, IdentifierIndex::len),
            "session ready"
        );

        Ok(Self {
            config,
            extension,
            source,
            index,
            records,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn source(&self) -> &SourceSheet {
        &self.source
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn primary_groups(&self) -> Vec<String> {
        distinct_values(&self.records, &self.config.primary_group_column)
    }

    pub fn filtered(&self, filter: &GroupFilter) -> RecordSet {
        filter_primary(&self.records, &self.config.primary_group_column, filter)
    }

    /// Secondary groups present under `filter`.
    pub fn secondary_groups(&self, filter: &GroupFilter) -> Vec<String> {
        distinct_values(&self.filtered(filter), &self.config.secondary_group_column)
    }

    pub fn group_records(&self, filter: &GroupFilter, group: &str) -> RecordSet {
        select_group(
            &self.filtered(filter),
            &self.config.secondary_group_column,
            group,
        )
    }

    pub fn project(&self, records: &RecordSet) -> Result<OutputWorkbook> {
        let index = self.index.as_ref().ok_or_else(|| SplitError::MissingColumn {
            column: self.config.identifier_column.clone(),
        })?;
        project(
            &self.source,
            index,
            records,
            &ProjectionOptions::from_config(&self.config),
        )
    }

    /// Formatted workbook bytes for `records`.
    pub fn build_workbook(&self, records: &RecordSet) -> Result<Vec<u8>> {
        write_workbook(&self.project(records)?)
    }

    /// Formatted workbook for every secondary group under `filter`, zipped.
    pub fn build_archive(&self, filter: &GroupFilter) -> Result<ArchiveReport> {
        let filtered = self.filtered(filter);
        let groups = distinct_values(&filtered, &self.config.secondary_group_column);
        info!(groups = groups.len(), "building archive");

        archive::build_archive(
            &groups,
            &self.config.period_label,
            &self.extension,
            |group| {
                let records = select_group(&filtered, &self.config.secondary_group_column, group);
                self.build_workbook(&records)
            },
        )
    }
}
