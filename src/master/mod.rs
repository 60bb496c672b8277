//! Master-side reconciliation of region locations
//!
//! The master is responsible for:
//! - Recording where regions are served in the meta table
//! - Tracking regions reported but not yet recorded (pending)
//! - Bringing meta regions online through the initial scan
//! - Retrying meta writes that hit transient failures
//! - Deferring events whose meta region is not reachable yet

pub mod dispatcher;
pub mod event;
pub mod http;
pub mod meta_scanner;
pub mod metadata;
pub mod region;
mod region_close;
mod region_open;
pub mod registry;
pub mod retry;
pub mod server;

pub use event::{ProcessOutcome, RegionEventKind, RegionStatusChange, RegionStatusEvent};
pub use metadata::{MemMetaStore, MetaRecord, MetaStore};
pub use region::{MetaRegion, RegionInfo, ServerAddress, ServerInfo};
pub use registry::MetaRegistry;
pub use retry::{MetaOutcome, RetryableMetaOperation};
pub use server::Master;

#[cfg(feature = "rocksdb")]
pub use metadata::RocksMetaStore;
