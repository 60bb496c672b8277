//! Master server

use crate::common::{Error, MasterConfig, Result};
use crate::master::dispatcher::{event_queue, spawn_workers, EventQueue, EventReceiver};
use crate::master::event::{RegionStatusChange, RegionStatusEvent};
use crate::master::http::create_router;
use crate::master::meta_scanner::MetaScanner;
use crate::master::metadata::MetaStore;
use crate::master::region::{MetaRegion, RegionInfo, ServerInfo};
use crate::master::registry::MetaRegistry;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared master state handed to every event and background task
pub struct Master {
    config: MasterConfig,
    store: Arc<dyn MetaStore>,
    registry: MetaRegistry,
    events: EventQueue,
    root_region: RwLock<Option<MetaRegion>>,
    span: tracing::Span,
}

impl Master {
    /// Build the master; the returned receiver feeds the worker pool.
    pub fn new(config: MasterConfig, store: Arc<dyn MetaStore>) -> (Arc<Self>, EventReceiver) {
        let span = tracing::info_span!("master");
        let registry = MetaRegistry::new(
            config.scan_queue_capacity,
            tracing::info_span!(parent: &span, "meta_registry"),
        );
        let (events, receiver) = event_queue(config.requeue_delay());
        let master = Self {
            config,
            store,
            registry,
            events,
            root_region: RwLock::new(None),
            span,
        };
        (Arc::new(master), receiver)
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    pub fn registry(&self) -> &MetaRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Record where the root region is served. Meta regions' rows live there.
    pub fn set_root_region(&self, root: MetaRegion) {
        tracing::info!(parent: &self.span, %root, "root region location set");
        *self.root_region.write() = Some(root);
    }

    pub fn root_region(&self) -> Option<MetaRegion> {
        self.root_region.read().clone()
    }

    /// The meta region holding `change`'s row, if it is known.
    pub fn meta_region_for(&self, change: &RegionStatusChange) -> Option<MetaRegion> {
        if change.is_meta_table() {
            self.root_region()
        } else {
            self.registry
                .meta_region_for_row(change.region().region_name())
        }
    }

    /// A region server reported `region` open.
    pub fn report_region_open(&self, region: RegionInfo, server: ServerInfo) -> Result<()> {
        Self::check_reportable(&region)?;
        let name = region.region_name().to_vec();
        let added = self.registry.add_pending(&name);
        if let Err(e) = self.events.submit(RegionStatusEvent::opened(region, server)) {
            // no event will clear an entry this report added
            if added {
                self.registry.clear_pending(&name);
            }
            return Err(e);
        }
        Ok(())
    }

    /// A region server reported `region` closed.
    pub fn report_region_close(&self, region: RegionInfo, offline: bool, reassign: bool) -> Result<()> {
        Self::check_reportable(&region)?;
        self.events
            .submit(RegionStatusEvent::closed(region, offline, reassign))
    }

    fn check_reportable(region: &RegionInfo) -> Result<()> {
        if region.is_root_region() {
            return Err(Error::InvalidRegion(format!(
                "root region {} is not tracked through meta",
                region
            )));
        }
        Ok(())
    }

    /// Run workers, the meta scanner and the admin API until ctrl-c.
    pub async fn serve(self: Arc<Self>, events: EventReceiver) -> Result<()> {
        tracing::info!(parent: &self.span, "Starting master");
        tracing::info!(parent: &self.span, "  Admin API: {}", self.config.bind_addr);
        tracing::info!(parent: &self.span, "  Workers: {}", self.config.workers);
        tracing::info!(
            parent: &self.span,
            "  Expected meta regions: {}",
            self.config.expected_meta_regions
        );

        let workers = spawn_workers(self.clone(), Arc::new(events), self.config.workers);
        let scanner = tokio::spawn(MetaScanner::new(self.clone()).run());

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let router = create_router(self.clone());

        tracing::info!(parent: &self.span, "✓ Master ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!(parent: &self.span, "Shutting down");
        self.registry.close_scan_queue();
        for worker in workers {
            worker.abort();
        }
        if let Err(e) = scanner.await {
            if !e.is_cancelled() {
                tracing::error!(parent: &self.span, "meta scanner task failed: {}", e);
            }
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::metadata::MemMetaStore;
    use crate::master::region::{ServerAddress, META_TABLE_NAME, ROOT_TABLE_NAME};

    fn master() -> (Arc<Master>, EventReceiver) {
        Master::new(MasterConfig::default(), Arc::new(MemMetaStore::new()))
    }

    #[tokio::test]
    async fn test_report_open_marks_pending_and_queues_event() {
        let (master, events) = master();
        let region = RegionInfo::new("tbl", "aaa", "", 1000);
        let server = ServerInfo::new(ServerAddress::new("10.0.0.5", 60020), 42);

        master.report_region_open(region.clone(), server).unwrap();
        assert!(master.registry().is_pending(region.region_name()));

        let event = events.recv().await.unwrap();
        assert_eq!(event.change().region(), &region);
    }

    #[test]
    fn test_root_region_reports_are_rejected() {
        let (master, _events) = master();
        let root = RegionInfo::new(ROOT_TABLE_NAME, "", "", 0);
        let server = ServerInfo::new(ServerAddress::new("10.0.0.5", 60020), 42);
        assert!(matches!(
            master.report_region_open(root, server),
            Err(Error::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_failed_submit_rolls_back_pending() {
        let (master, events) = master();
        drop(events);
        let region = RegionInfo::new("tbl", "aaa", "", 1000);
        let server = ServerInfo::new(ServerAddress::new("10.0.0.5", 60020), 42);

        assert!(matches!(
            master.report_region_open(region.clone(), server.clone()),
            Err(Error::Internal(_))
        ));
        assert!(!master.registry().is_pending(region.region_name()));

        // an entry owned by an earlier report stays
        master.registry().add_pending(region.region_name());
        assert!(master.report_region_open(region.clone(), server).is_err());
        assert!(master.registry().is_pending(region.region_name()));
    }

    #[test]
    fn test_meta_region_resolution() {
        let (master, _events) = master();
        let user = RegionStatusChange::new(RegionInfo::new("tbl", "aaa", "", 1000));
        let meta = RegionStatusChange::new(RegionInfo::new(META_TABLE_NAME, "", "", 1));
        assert!(master.meta_region_for(&user).is_none());
        assert!(master.meta_region_for(&meta).is_none());

        let rs = ServerAddress::new("rs1", 60020);
        master.set_root_region(MetaRegion::root(rs.clone()));
        master
            .registry()
            .mark_online(MetaRegion::new(rs, "meta,,1", "", ""));

        assert_eq!(
            master.meta_region_for(&user).unwrap().region_name(),
            b"meta,,1"
        );
        assert!(master.meta_region_for(&meta).unwrap().region_name().starts_with(b"root"));
    }
}
