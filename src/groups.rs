use crate::dataset::RecordSet;
use crate::error::{Result, SplitError};

/// Selection label meaning "no primary filter".
pub const ALL_GROUPS: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupFilter {
    #[default]
    All,
    Only(String),
}

impl GroupFilter {
    /// `None` and `"All"` select everything.
    pub fn from_selection(selection: Option<&str>) -> Self {
        match selection {
            None | Some(ALL_GROUPS) => Self::All,
            Some(value) => Self::Only(value.to_string()),
        }
    }
}

/// Fail with every missing column name when any of `columns` is absent.
pub fn require_columns(records: &RecordSet, columns: &[&str]) -> Result<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !records.has_column(c))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SplitError::MissingColumns { columns: missing })
    }
}

/// Sorted distinct non-empty values of `column`, as displayed.
pub fn distinct_values(records: &RecordSet, column: &str) -> Vec<String> {
    let mut values: Vec<String> = records
        .records()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect();
    values.sort();
    values.dedup();
    values
}

/// Rows whose `column` displays as `value`.
pub fn select_group(records: &RecordSet, column: &str, value: &str) -> RecordSet {
    records.filter(|r| {
        r.get(column)
            .is_some_and(|v| !v.is_empty() && v.to_string() == value)
    })
}

pub fn filter_primary(records: &RecordSet, column: &str, filter: &GroupFilter) -> RecordSet {
    match filter {
        GroupFilter::All => records.clone(),
        GroupFilter::Only(value) => select_group(records, column, value),
    }
}
