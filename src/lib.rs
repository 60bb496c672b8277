//! # regionmeta
//!
//! Master-side bookkeeping for a range-partitioned key-value store:
//! - Region servers report regions opened or closed
//! - Each report is applied to the meta table with retries
//! - Meta regions come online through an initial scan
//! - Reports whose meta region is not reachable are requeued
//!
//! ## Architecture
//!
//! ```text
//!   region servers ──HTTP──▶ ┌──────────────────────────────┐
//!                            │            Master            │
//!                            │  pending set ── event queue  │
//!                            │                     │        │
//!                            │              worker pool     │
//!                            │                     │        │
//!                            │   RetryableMetaOperation     │
//!                            └─────────────┬────────────────┘
//!                                          │ write / scan
//!                            ┌─────────────▼────────────────┐
//!                            │  root region ─▶ meta regions │
//!                            │          (MetaStore)         │
//!                            └──────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! regionmeta-master serve \
//!   --bind 0.0.0.0:60010 \
//!   --root rs1:60020 \
//!   --expected-meta-regions 1
//! ```

pub mod common;
pub mod filter;
pub mod master;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use master::Master;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
