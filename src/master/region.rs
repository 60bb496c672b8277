//! Region, server and meta-region identities

use crate::common::{display_key, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the table holding region locations
pub const META_TABLE_NAME: &str = "meta";

/// Name of the table holding meta region locations
pub const ROOT_TABLE_NAME: &str = "root";

/// A contiguous key range of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    table_name: String,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    region_id: u64,
    region_name: Vec<u8>,
}

impl RegionInfo {
    pub fn new(
        table_name: impl Into<String>,
        start_key: impl Into<Vec<u8>>,
        end_key: impl Into<Vec<u8>>,
        region_id: u64,
    ) -> Self {
        let table_name = table_name.into();
        let start_key = start_key.into();
        let region_name = Self::create_region_name(&table_name, &start_key, region_id);
        Self {
            table_name,
            start_key,
            end_key: end_key.into(),
            region_id,
            region_name,
        }
    }

    /// `table,start_key,region_id`
    pub fn create_region_name(table_name: &str, start_key: &[u8], region_id: u64) -> Vec<u8> {
        let mut name = Vec::with_capacity(table_name.len() + start_key.len() + 22);
        name.extend_from_slice(table_name.as_bytes());
        name.push(b',');
        name.extend_from_slice(start_key);
        name.push(b',');
        name.extend_from_slice(region_id.to_string().as_bytes());
        name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    pub fn region_id(&self) -> u64 {
        self.region_id
    }

    pub fn region_name(&self) -> &[u8] {
        &self.region_name
    }

    pub fn region_name_as_string(&self) -> String {
        display_key(&self.region_name)
    }

    pub fn is_meta_table(&self) -> bool {
        self.table_name == META_TABLE_NAME
    }

    pub fn is_root_region(&self) -> bool {
        self.table_name == ROOT_TABLE_NAME
    }
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.region_name_as_string())
    }
}

/// `host:port` of a region server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidRegion(format!("missing port in address: {}", s)))?;
        if host.is_empty() {
            return Err(Error::InvalidRegion(format!("missing host in address: {}", s)));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidRegion(format!("invalid port in address: {}", s)))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ServerAddress> for String {
    fn from(addr: ServerAddress) -> Self {
        addr.to_string()
    }
}

/// A region server incarnation: its address plus the start code it was
/// launched with. A restarted server reports a larger start code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    address: ServerAddress,
    start_code: u64,
}

impl ServerInfo {
    pub fn new(address: ServerAddress, start_code: u64) -> Self {
        Self {
            address,
            start_code,
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn start_code(&self) -> u64 {
        self.start_code
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (startcode {})", self.address, self.start_code)
    }
}

/// Location of one meta region: where it is served and which rows it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRegion {
    server: ServerAddress,
    region_name: Vec<u8>,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
}

impl MetaRegion {
    pub fn new(
        server: ServerAddress,
        region_name: impl Into<Vec<u8>>,
        start_key: impl Into<Vec<u8>>,
        end_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            server,
            region_name: region_name.into(),
            start_key: start_key.into(),
            end_key: end_key.into(),
        }
    }

    /// Handle for a region that has just opened on `server`.
    pub fn from_region(region: &RegionInfo, server: ServerAddress) -> Self {
        Self::new(
            server,
            region.region_name(),
            region.start_key(),
            region.end_key(),
        )
    }

    /// Handle for the root region served by `server`.
    pub fn root(server: ServerAddress) -> Self {
        Self::new(
            server,
            RegionInfo::create_region_name(ROOT_TABLE_NAME, b"", 0),
            Vec::new(),
            Vec::new(),
        )
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    pub fn region_name(&self) -> &[u8] {
        &self.region_name
    }

    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }
}

impl fmt::Display for MetaRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{server: {}, regionname: {}, startKey: <{}>}}",
            self.server,
            display_key(&self.region_name),
            display_key(&self.start_key)
        )
    }
}
