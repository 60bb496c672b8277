//! Initial scan of meta regions
//!
//! Meta regions reported open before the initial scan completes are queued
//! by the registry. The scanner takes them one at a time, reads the region
//! locations they hold, and puts them online. Once the expected number of
//! meta regions is online the initial scan is complete and later meta
//! regions go straight online.

use crate::common::{display_key, Result};
use crate::filter::RowFilter;
use crate::master::metadata::MetaStore;
use crate::master::region::MetaRegion;
use crate::master::retry::{MetaOutcome, RetryableMetaOperation};
use crate::master::server::Master;
use std::sync::Arc;

/// What one meta region scan found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub rows: usize,
    pub assigned: usize,
    /// Rows with no server recorded
    pub unassigned: Vec<Vec<u8>>,
}

pub struct MetaScanner {
    master: Arc<Master>,
    span: tracing::Span,
}

impl MetaScanner {
    pub fn new(master: Arc<Master>) -> Self {
        let span = tracing::info_span!(parent: master.span(), "meta_scanner");
        Self { master, span }
    }

    /// Scan the rows held by one meta region.
    pub async fn scan_region(&self, region: &MetaRegion) -> Result<MetaOutcome<ScanReport>> {
        let store = self.master.store().as_ref();
        RetryableMetaOperation::new(Some(region.clone()), &self.master)
            .run_with_retries(|meta_region| async move { scan_rows(store, &meta_region) })
            .await
    }

    /// Serve the scan queue until it is closed.
    pub async fn run(self) -> Result<()> {
        let registry = self.master.registry();
        let expected = self.master.config().expected_meta_regions;
        self.check_initial_scan(expected);

        while let Some(region) = registry.next_to_scan().await {
            loop {
                match self.scan_region(&region).await {
                    Ok(MetaOutcome::Committed(report)) => {
                        tracing::info!(
                            parent: &self.span,
                            rows = report.rows,
                            assigned = report.assigned,
                            unassigned = report.unassigned.len(),
                            "scanned {}",
                            region
                        );
                        break;
                    }
                    Ok(MetaOutcome::Deferred) => {
                        tracing::debug!(parent: &self.span, "{} not reachable yet", region);
                    }
                    Err(e) => {
                        tracing::warn!(parent: &self.span, "scan of {} failed: {}", region, e);
                    }
                }
                if registry.is_scan_queue_closed() {
                    return Ok(());
                }
                tokio::time::sleep(self.master.config().requeue_delay()).await;
            }

            let online = registry.finish_scan(region);
            tracing::debug!(parent: &self.span, "{} online", online);
            self.check_initial_scan(expected);
        }

        tracing::debug!(parent: &self.span, "meta scan queue closed, scanner exiting");
        Ok(())
    }

    fn check_initial_scan(&self, expected: usize) {
        let registry = self.master.registry();
        if !registry.is_initial_scan_complete() && registry.online_count() >= expected {
            registry.complete_initial_scan();
        }
    }
}

fn scan_rows(store: &dyn MetaStore, meta_region: &MetaRegion) -> Result<ScanReport> {
    let filter = RowFilter::for_end_key(meta_region.end_key());
    let records = store.scan(meta_region.region_name(), meta_region.start_key(), &filter)?;

    let mut report = ScanReport {
        rows: records.len(),
        ..Default::default()
    };
    for record in records {
        match record.server_info()? {
            Some(server) => {
                tracing::trace!("{} served by {}", display_key(record.row()), server);
                report.assigned += 1;
            }
            None => report.unassigned.push(record.row().to_vec()),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MasterConfig;
    use crate::master::metadata::{MemMetaStore, MetaRecord};
    use crate::master::region::{ServerAddress, ServerInfo};

    #[tokio::test]
    async fn test_scan_region_counts_rows_within_bounds() {
        let store = Arc::new(MemMetaStore::new());
        let server = ServerInfo::new(ServerAddress::new("rs1", 60020), 1);
        for row in ["tbl,aaa,1", "tbl,ccc,1", "tbl,mmm,1"] {
            store
                .write(b"meta,,1", &MetaRecord::location(row, &server))
                .unwrap();
        }
        store
            .write(b"meta,,1", &MetaRecord::from_columns("tbl,bbb,1", Default::default()))
            .unwrap();

        let (master, _events) = Master::new(MasterConfig::default(), store);
        let scanner = MetaScanner::new(master);
        let region = MetaRegion::new(ServerAddress::new("rs1", 60020), "meta,,1", "", "tbl,m");

        let report = scanner.scan_region(&region).await.unwrap().committed().unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.assigned, 2);
        assert_eq!(report.unassigned, vec![b"tbl,bbb,1".to_vec()]);
    }
}
