//! Meta table rows and the store they are written to
//!
//! Every region has one row in a meta region (or, for meta regions, in the
//! root region), keyed by region name:
//! - `server`: UTF-8 `host:port` of the serving region server
//! - `startcode`: big-endian 8-byte start code of that server
//!
//! The store itself lives on region servers; the master only reaches it
//! through [`MetaStore`].

use crate::common::{display_key, Error, Result};
use crate::filter::RowFilter;
use crate::master::region::{MetaRegion, ServerAddress, ServerInfo};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const COL_SERVER: &str = "server";
pub const COL_STARTCODE: &str = "startcode";

/// Column name → value for one meta row
pub type Columns = BTreeMap<String, Vec<u8>>;

/// One row of a meta region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord {
    row: Vec<u8>,
    columns: Columns,
}

impl MetaRecord {
    /// Location record for a region opened on `server`.
    pub fn location(row: impl Into<Vec<u8>>, server: &ServerInfo) -> Self {
        let mut columns = Columns::new();
        columns.insert(
            COL_SERVER.to_string(),
            server.address().to_string().into_bytes(),
        );
        columns.insert(
            COL_STARTCODE.to_string(),
            server.start_code().to_be_bytes().to_vec(),
        );
        Self {
            row: row.into(),
            columns,
        }
    }

    pub fn from_columns(row: impl Into<Vec<u8>>, columns: Columns) -> Self {
        Self {
            row: row.into(),
            columns,
        }
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Serving address, if the region is assigned.
    pub fn server(&self) -> Result<Option<ServerAddress>> {
        match self.columns.get(COL_SERVER) {
            None => Ok(None),
            Some(bytes) => {
                let s = std::str::from_utf8(bytes).map_err(|_| {
                    Error::MetadataCorrupted(format!(
                        "non UTF-8 server in row {}",
                        display_key(&self.row)
                    ))
                })?;
                let addr = s.parse().map_err(|_| {
                    Error::MetadataCorrupted(format!(
                        "invalid server '{}' in row {}",
                        s,
                        display_key(&self.row)
                    ))
                })?;
                Ok(Some(addr))
            }
        }
    }

    pub fn start_code(&self) -> Result<Option<u64>> {
        match self.columns.get(COL_STARTCODE) {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::MetadataCorrupted(format!(
                        "startcode of {} bytes in row {}",
                        bytes.len(),
                        display_key(&self.row)
                    ))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
        }
    }

    /// The server incarnation recorded in this row, if both columns are set.
    pub fn server_info(&self) -> Result<Option<ServerInfo>> {
        match (self.server()?, self.start_code()?) {
            (Some(address), Some(start_code)) => Ok(Some(ServerInfo::new(address, start_code))),
            _ => Ok(None),
        }
    }
}

/// Access to meta regions hosted on region servers.
///
/// Transient failures are reported with errors for which
/// [`Error::is_transient`] holds; callers retry those.
pub trait MetaStore: Send + Sync {
    /// Whether `meta_region` can currently take reads and writes.
    fn is_reachable(&self, meta_region: &MetaRegion) -> bool;

    /// Write the record's columns into its row, replacing earlier values.
    fn write(&self, meta_region_name: &[u8], record: &MetaRecord) -> Result<()>;

    /// Remove the named columns from a row; absent columns are ignored.
    fn delete_columns(&self, meta_region_name: &[u8], row: &[u8], columns: &[&str])
        -> Result<()>;

    fn get(&self, meta_region_name: &[u8], row: &[u8]) -> Result<Option<MetaRecord>>;

    /// Rows from `start_row` onward, in key order, that pass `filter`.
    fn scan(
        &self,
        meta_region_name: &[u8],
        start_row: &[u8],
        filter: &RowFilter,
    ) -> Result<Vec<MetaRecord>>;
}

/// In-memory meta store (default)
#[derive(Default)]
pub struct MemMetaStore {
    regions: RwLock<HashMap<Vec<u8>, BTreeMap<Vec<u8>, Columns>>>,
    unreachable: RwLock<HashSet<Vec<u8>>>,
}

impl MemMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a meta region as (un)reachable. Regions are reachable by default.
    pub fn set_reachable(&self, meta_region_name: &[u8], reachable: bool) {
        let mut unreachable = self.unreachable.write();
        if reachable {
            unreachable.remove(meta_region_name);
        } else {
            unreachable.insert(meta_region_name.to_vec());
        }
    }

    /// Number of rows held for a meta region
    pub fn row_count(&self, meta_region_name: &[u8]) -> usize {
        self.regions
            .read()
            .get(meta_region_name)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    fn check_reachable(&self, meta_region_name: &[u8]) -> Result<()> {
        if self.unreachable.read().contains(meta_region_name) {
            return Err(Error::StoreUnavailable(display_key(meta_region_name)));
        }
        Ok(())
    }
}

impl MetaStore for MemMetaStore {
    fn is_reachable(&self, meta_region: &MetaRegion) -> bool {
        !self.unreachable.read().contains(meta_region.region_name())
    }

    fn write(&self, meta_region_name: &[u8], record: &MetaRecord) -> Result<()> {
        self.check_reachable(meta_region_name)?;
        let mut regions = self.regions.write();
        let row = regions
            .entry(meta_region_name.to_vec())
            .or_default()
            .entry(record.row().to_vec())
            .or_default();
        for (column, value) in record.columns() {
            row.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    fn delete_columns(
        &self,
        meta_region_name: &[u8],
        row: &[u8],
        columns: &[&str],
    ) -> Result<()> {
        self.check_reachable(meta_region_name)?;
        let mut regions = self.regions.write();
        if let Some(values) = regions
            .get_mut(meta_region_name)
            .and_then(|rows| rows.get_mut(row))
        {
            for column in columns {
                values.remove(*column);
            }
        }
        Ok(())
    }

    fn get(&self, meta_region_name: &[u8], row: &[u8]) -> Result<Option<MetaRecord>> {
        self.check_reachable(meta_region_name)?;
        Ok(self
            .regions
            .read()
            .get(meta_region_name)
            .and_then(|rows| rows.get(row))
            .map(|columns| MetaRecord::from_columns(row, columns.clone())))
    }

    fn scan(
        &self,
        meta_region_name: &[u8],
        start_row: &[u8],
        filter: &RowFilter,
    ) -> Result<Vec<MetaRecord>> {
        self.check_reachable(meta_region_name)?;
        let regions = self.regions.read();
        let Some(rows) = regions.get(meta_region_name) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for (row, columns) in rows.range(start_row.to_vec()..) {
            if filter.stop_scan() {
                break;
            }
            if !filter.keep(row) {
                // rows are sorted, a stop-row filter excludes the rest too
                if matches!(filter, RowFilter::StopRow(_)) {
                    break;
                }
                continue;
            }
            records.push(MetaRecord::from_columns(row.clone(), columns.clone()));
        }
        Ok(records)
    }
}

#[cfg(feature = "rocksdb")]
pub use rocks::RocksMetaStore;

#[cfg(feature = "rocksdb")]
mod rocks {
    use super::*;
    use parking_lot::Mutex;
    use rocksdb::{Direction, IteratorMode, Options, DB};
    use std::path::Path;

    /// RocksDB-backed meta store; rows are keyed `meta_region_name \0 row`.
    ///
    /// A row is one blob, so writes and column deletes read-modify-write it
    /// under `row_lock`.
    pub struct RocksMetaStore {
        db: DB,
        row_lock: Mutex<()>,
    }

    impl RocksMetaStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            let db = DB::open(&opts, path)?;
            Ok(Self {
                db,
                row_lock: Mutex::new(()),
            })
        }

        fn prefix(meta_region_name: &[u8]) -> Vec<u8> {
            let mut prefix = Vec::with_capacity(meta_region_name.len() + 1);
            prefix.extend_from_slice(meta_region_name);
            prefix.push(0);
            prefix
        }

        fn key(meta_region_name: &[u8], row: &[u8]) -> Vec<u8> {
            let mut key = Self::prefix(meta_region_name);
            key.extend_from_slice(row);
            key
        }

        fn decode(bytes: &[u8]) -> Result<Columns> {
            bincode::deserialize(bytes).map_err(|e| Error::MetadataCorrupted(e.to_string()))
        }

        fn encode(columns: &Columns) -> Result<Vec<u8>> {
            bincode::serialize(columns)
                .map_err(|e| Error::Internal(format!("Serialize error: {}", e)))
        }
    }

    impl MetaStore for RocksMetaStore {
        fn is_reachable(&self, _meta_region: &MetaRegion) -> bool {
            true
        }

        fn write(&self, meta_region_name: &[u8], record: &MetaRecord) -> Result<()> {
            let key = Self::key(meta_region_name, record.row());
            let _guard = self.row_lock.lock();
            let mut columns = match self.db.get(&key)? {
                Some(bytes) => Self::decode(&bytes)?,
                None => Columns::new(),
            };
            columns.extend(record.columns().clone());
            self.db.put(key, Self::encode(&columns)?)?;
            Ok(())
        }

        fn delete_columns(
            &self,
            meta_region_name: &[u8],
            row: &[u8],
            columns: &[&str],
        ) -> Result<()> {
            let key = Self::key(meta_region_name, row);
            let _guard = self.row_lock.lock();
            if let Some(bytes) = self.db.get(&key)? {
                let mut values = Self::decode(&bytes)?;
                for column in columns {
                    values.remove(*column);
                }
                self.db.put(key, Self::encode(&values)?)?;
            }
            Ok(())
        }

        fn get(&self, meta_region_name: &[u8], row: &[u8]) -> Result<Option<MetaRecord>> {
            match self.db.get(Self::key(meta_region_name, row))? {
                Some(bytes) => Ok(Some(MetaRecord::from_columns(row, Self::decode(&bytes)?))),
                None => Ok(None),
            }
        }

        fn scan(
            &self,
            meta_region_name: &[u8],
            start_row: &[u8],
            filter: &RowFilter,
        ) -> Result<Vec<MetaRecord>> {
            let prefix = Self::prefix(meta_region_name);
            let start = Self::key(meta_region_name, start_row);
            let iter = self
                .db
                .iterator(IteratorMode::From(&start, Direction::Forward));

            let mut records = Vec::new();
            for item in iter {
                let (key, value) = item?;
                let Some(row) = key.strip_prefix(prefix.as_slice()) else {
                    break;
                };
                if filter.stop_scan() || !filter.keep(row) {
                    break;
                }
                records.push(MetaRecord::from_columns(row, Self::decode(&value)?));
            }
            Ok(records)
        }
    }

}
