//! Row filter that ends a scan at a stop row

use serde::{Deserialize, Serialize};

/// Excludes rows whose key is greater than or equal to `stop_row`.
///
/// With no stop row set the filter passes every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRowFilter {
    stop_row: Option<Vec<u8>>,
}

impl StopRowFilter {
    pub fn new(stop_row: impl Into<Vec<u8>>) -> Self {
        Self {
            stop_row: Some(stop_row.into()),
        }
    }

    /// A filter with no bound, equivalent to an empty region end key.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn stop_row(&self) -> Option<&[u8]> {
        self.stop_row.as_deref()
    }

    /// Returns true if the row should be excluded.
    ///
    /// A missing row key is never past the stop row.
    pub fn filter_row_key(&self, row_key: Option<&[u8]>) -> bool {
        match (self.stop_row.as_deref(), row_key) {
            (Some(stop), Some(row)) => stop <= row,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_row_is_exclusive() {
        let filter = StopRowFilter::new("m");
        assert!(!filter.filter_row_key(Some(&b"a"[..])));
        assert!(filter.filter_row_key(Some(&b"m"[..])));
        assert!(filter.filter_row_key(Some(&b"z"[..])));
    }

    #[test]
    fn test_byte_lexicographic_order() {
        let filter = StopRowFilter::new(b"tbl,bbb".to_vec());
        assert!(!filter.filter_row_key(Some(&b"tbl,aaa,1000"[..])));
        assert!(!filter.filter_row_key(Some(&b"tbl,bb"[..])));
        assert!(filter.filter_row_key(Some(&b"tbl,bbb,1"[..])));
        assert!(filter.filter_row_key(Some(&[0xffu8][..])));
    }

    #[test]
    fn test_missing_bound_or_key() {
        let unbounded = StopRowFilter::unbounded();
        assert!(!unbounded.filter_row_key(Some(&b"anything"[..])));
        assert!(!unbounded.filter_row_key(None));

        let bounded = StopRowFilter::new("m");
        assert!(!bounded.filter_row_key(None));
    }
}
