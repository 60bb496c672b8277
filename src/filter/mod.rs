//! Row filters applied while scanning meta regions
//!
//! The scan loop asks a filter two things per row: whether to keep the row
//! (`keep`) and whether the whole remaining scan can be abandoned
//! (`stop_scan`). Filters travel to region servers, so each one also has a
//! byte encoding.

pub mod stop_row;

pub use stop_row::StopRowFilter;

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};

/// The closed set of row filters understood by the master.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowFilter {
    /// Keep every row
    #[default]
    PassAll,
    /// Keep rows strictly before a stop row
    StopRow(StopRowFilter),
}

impl RowFilter {
    pub fn stop_row(stop_row: impl Into<Vec<u8>>) -> Self {
        RowFilter::StopRow(StopRowFilter::new(stop_row))
    }

    /// Filter bounded by a region end key; an empty end key means "to the end of the table".
    pub fn for_end_key(end_key: &[u8]) -> Self {
        if end_key.is_empty() {
            RowFilter::PassAll
        } else {
            RowFilter::stop_row(end_key)
        }
    }

    /// Returns true if the row should be excluded.
    pub fn filter_row_key(&self, row_key: Option<&[u8]>) -> bool {
        match self {
            RowFilter::PassAll => false,
            RowFilter::StopRow(f) => f.filter_row_key(row_key),
        }
    }

    pub fn keep(&self, row_key: &[u8]) -> bool {
        !self.filter_row_key(Some(row_key))
    }

    /// Whether every remaining row can be skipped without inspection.
    pub fn stop_scan(&self) -> bool {
        false
    }

    /// Clear per-scan state. None of the current filters carry any.
    pub fn reset(&mut self) {}

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| Error::Internal(format!("Serialize filter error: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::MetadataCorrupted(format!("Invalid filter encoding: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_with_stop_row() {
        let filter = RowFilter::stop_row("m");
        assert!(filter.keep(b"a"));
        assert!(!filter.keep(b"m"));
        assert!(!filter.keep(b"z"));
        assert!(!filter.stop_scan());
    }

    #[test]
    fn test_end_key_filter() {
        assert_eq!(RowFilter::for_end_key(b""), RowFilter::PassAll);
        assert!(RowFilter::for_end_key(b"").keep(b"\xff\xff"));
        assert!(!RowFilter::for_end_key(b"tbl,m").keep(b"tbl,z,1"));
    }

    #[test]
    fn test_encoding_preserves_bound() {
        let filter = RowFilter::stop_row(b"tbl,mmm".to_vec());
        let decoded = RowFilter::from_bytes(&filter.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, filter);
        assert!(!decoded.keep(b"tbl,zzz"));

        assert!(RowFilter::from_bytes(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
