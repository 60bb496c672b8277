//! Region status events reported by region servers

use crate::common::{timestamp_now_millis, Result};
use crate::master::region::{RegionInfo, ServerInfo};
use crate::master::retry::MetaOutcome;
use crate::master::server::Master;
use crate::master::{region_close, region_open};
use std::fmt;
use tracing::Instrument;

/// Context shared by every kind of status change for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionStatusChange {
    region: RegionInfo,
    is_meta_table: bool,
}

impl RegionStatusChange {
    pub fn new(region: RegionInfo) -> Self {
        let is_meta_table = region.is_meta_table();
        Self::with_meta_flag(region, is_meta_table)
    }

    pub fn with_meta_flag(region: RegionInfo, is_meta_table: bool) -> Self {
        Self {
            region,
            is_meta_table,
        }
    }

    pub fn region(&self) -> &RegionInfo {
        &self.region
    }

    /// Whether the region is itself a meta region
    pub fn is_meta_table(&self) -> bool {
        self.is_meta_table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionEventKind {
    /// The region finished opening on `server`
    Opened { server: ServerInfo },
    /// The region was closed; `offline` clears its location, `reassign`
    /// hands it back for assignment
    Closed { offline: bool, reassign: bool },
}

impl RegionEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            RegionEventKind::Opened { .. } => "opened",
            RegionEventKind::Closed { .. } => "closed",
        }
    }
}

/// How a processed event ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Meta was updated
    Committed,
    /// Meta was unreachable; the event went back on the delayed queue
    Deferred,
}

impl ProcessOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ProcessOutcome::Committed)
    }

    /// Deferred work is not a failure from the reporter's point of view.
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Committed | ProcessOutcome::Deferred)
    }
}

impl<T> From<MetaOutcome<T>> for ProcessOutcome {
    fn from(outcome: MetaOutcome<T>) -> Self {
        match outcome {
            MetaOutcome::Committed(_) => ProcessOutcome::Committed,
            MetaOutcome::Deferred => ProcessOutcome::Deferred,
        }
    }
}

/// One report from a region server, queued for processing
#[derive(Debug, Clone)]
pub struct RegionStatusEvent {
    change: RegionStatusChange,
    kind: RegionEventKind,
    reported_at: u64,
}

impl RegionStatusEvent {
    pub fn new(change: RegionStatusChange, kind: RegionEventKind) -> Self {
        Self {
            change,
            kind,
            reported_at: timestamp_now_millis(),
        }
    }

    pub fn opened(region: RegionInfo, server: ServerInfo) -> Self {
        Self::new(
            RegionStatusChange::new(region),
            RegionEventKind::Opened { server },
        )
    }

    pub fn closed(region: RegionInfo, offline: bool, reassign: bool) -> Self {
        Self::new(
            RegionStatusChange::new(region),
            RegionEventKind::Closed { offline, reassign },
        )
    }

    pub fn change(&self) -> &RegionStatusChange {
        &self.change
    }

    pub fn kind(&self) -> &RegionEventKind {
        &self.kind
    }

    /// Unix time (ms) at which the report was received
    pub fn reported_at(&self) -> u64 {
        self.reported_at
    }

    /// Apply the event to meta and the registry.
    pub async fn process(&self, master: &Master) -> Result<ProcessOutcome> {
        let span = tracing::info_span!(
            parent: master.span(),
            "region_event",
            region = %self.change.region(),
            kind = self.kind.name(),
        );
        async {
            match &self.kind {
                RegionEventKind::Opened { server } => {
                    region_open::process(master, self, server).await
                }
                RegionEventKind::Closed { offline, reassign } => {
                    region_close::process(master, self, *offline, *reassign).await
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl fmt::Display for RegionStatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RegionEventKind::Opened { server } => write!(
                f,
                "region {} opened on {}",
                self.change.region(),
                server.address()
            ),
            RegionEventKind::Closed { offline, reassign } => write!(
                f,
                "region {} closed (offline: {}, reassign: {})",
                self.change.region(),
                offline,
                reassign
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::region::{ServerAddress, META_TABLE_NAME};

    #[test]
    fn test_meta_flag_follows_table() {
        let server = ServerInfo::new(ServerAddress::new("rs1", 60020), 7);
        let user = RegionStatusEvent::opened(RegionInfo::new("tbl", "", "", 1), server.clone());
        let meta = RegionStatusEvent::opened(RegionInfo::new(META_TABLE_NAME, "", "", 1), server);
        assert!(!user.change().is_meta_table());
        assert!(meta.change().is_meta_table());
        assert_eq!(meta.kind().name(), "opened");
    }

    #[test]
    fn test_display() {
        let event = RegionStatusEvent::opened(
            RegionInfo::new("tbl", "aaa", "", 1000),
            ServerInfo::new("10.0.0.5:60020".parse().unwrap(), 42),
        );
        assert_eq!(event.to_string(), "region tbl,aaa,1000 opened on 10.0.0.5:60020");

        let event = RegionStatusEvent::closed(RegionInfo::new("tbl", "aaa", "", 1000), true, false);
        assert!(event.to_string().contains("offline: true"));
    }

    #[test]
    fn test_outcome_from_meta_outcome() {
        assert_eq!(
            ProcessOutcome::from(MetaOutcome::Committed(())),
            ProcessOutcome::Committed
        );
        assert_eq!(
            ProcessOutcome::from(MetaOutcome::<()>::Deferred),
            ProcessOutcome::Deferred
        );
        assert!(ProcessOutcome::Deferred.is_success());
        assert!(!ProcessOutcome::Deferred.is_committed());
    }
}
