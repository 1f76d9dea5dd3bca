//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Replay pipeline for recorded measurement files."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::cmp::Ordering;

use chrono::{NaiveDateTime, TimeDelta};
use r_player_common::time::parse_timestamp;

use crate::{ReplayError, Result};

/// Columns of a replay data line.
pub const DATA_COLUMNS: usize = 4;

const TIMESTAMP_COLUMN: usize = 2;

/// One line of the replay data file: `assetId;measurementPointId;timestamp;value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRecord {
    /// Asset identifier as written in the file.
    pub asset_id: String,
    /// Measurement point identifier within the asset.
    pub point_id: i32,
    /// Timestamp as recorded.
    pub original_timestamp: NaiveDateTime,
    /// Recorded timestamp transposed to the current run.
    pub shifted_timestamp: NaiveDateTime,
    /// Raw value with `,` decimal separators already replaced by `.`.
    pub value: String,
    /// One-based line in the data file, `0` when not read from a file.
    pub line: u64,
}

impl ReplayRecord {
    /// Parse a semicolon separated data line.
    pub fn parse(line: &str) -> Result<Self> {
        let columns: Vec<&str> = line.split(';').map(str::trim).collect();
        if columns.len() != DATA_COLUMNS {
            return Err(ReplayError::ColumnCount(columns.len()));
        }
        let point_id = columns[1]
            .parse()
            .map_err(|_| ReplayError::InvalidPointId(columns[1].to_owned()))?;
        let original_timestamp =
            parse_timestamp(columns[TIMESTAMP_COLUMN]).map_err(|source| {
                ReplayError::InvalidTimestamp {
                    raw: columns[TIMESTAMP_COLUMN].to_owned(),
                    source,
                }
            })?;
        Ok(Self {
            asset_id: columns[0].to_owned(),
            point_id,
            original_timestamp,
            shifted_timestamp: original_timestamp,
            value: columns[3].replace(',', "."),
            line: 0,
        })
    }

    /// Transpose the recorded timestamp by `shift`.
    pub fn apply_shift(&mut self, shift: TimeDelta) {
        self.shifted_timestamp = self.original_timestamp + shift;
    }

    /// Whether `other` addresses the same point at the same shifted instant.
    pub fn same_key(&self, other: &ReplayRecord) -> bool {
        self.point_id == other.point_id
            && self.shifted_timestamp == other.shifted_timestamp
            && self.asset_id == other.asset_id
    }
}

/// Timestamp column of a raw data line, if it parses.
pub fn line_timestamp(line: &str) -> Option<NaiveDateTime> {
    line.split(';')
        .nth(TIMESTAMP_COLUMN)
        .and_then(|raw| parse_timestamp(raw).ok())
}

/// Newest first; lines without a readable timestamp sort last.
pub fn descending_by_timestamp(left: &str, right: &str) -> Ordering {
    match (line_timestamp(left), line_timestamp(right)) {
        (Some(l), Some(r)) => r.cmp(&l),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalises_decimal_comma() {
        let record = ReplayRecord::parse("A1;1;2024-01-01 00:00:00.000;1,5").unwrap();
        assert_eq!(record.asset_id, "A1");
        assert_eq!(record.point_id, 1);
        assert_eq!(record.value, "1.5");
        assert_eq!(record.shifted_timestamp, record.original_timestamp);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            ReplayRecord::parse("A1;1;2024-01-01 00:00:00.000"),
            Err(ReplayError::ColumnCount(3))
        ));
        assert!(matches!(
            ReplayRecord::parse("A1;one;2024-01-01 00:00:00.000;1"),
            Err(ReplayError::InvalidPointId(_))
        ));
        assert!(matches!(
            ReplayRecord::parse("A1;1;yesterday;1"),
            Err(ReplayError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn descending_comparator_is_stable_for_ties() {
        let mut lines = vec![
            "A1;1;2024-01-01 00:00:00.000;a",
            "A1;1;2024-01-01 00:00:02.000;b",
            "A1;2;2024-01-01 00:00:00.000;c",
            "garbage",
            "A1;1;2024-01-01 00:00:01.000;d",
        ];
        lines.sort_by(|l, r| descending_by_timestamp(l, r));
        let values: Vec<_> = lines.iter().map(|l| l.rsplit(';').next().unwrap()).collect();
        assert_eq!(values, vec!["b", "d", "a", "c", "garbage"]);
    }
}
