//! Integration tests for bringing meta regions online

use regionmeta::{
    common::MasterConfig,
    filter::RowFilter,
    master::{
        dispatcher::spawn_workers, meta_scanner::MetaScanner, MemMetaStore, MetaRecord,
        MetaRegion, MetaStore, RegionInfo, ServerAddress, ServerInfo,
    },
    Master,
};
use std::sync::Arc;
use std::time::Duration;

fn config(expected_meta_regions: usize) -> MasterConfig {
    let mut config = MasterConfig::default();
    config.requeue_delay_ms = 10;
    config.expected_meta_regions = expected_meta_regions;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

#[tokio::test]
async fn test_initial_scan_brings_meta_regions_online() {
    let store = Arc::new(MemMetaStore::new());
    let (master, events) = Master::new(config(2), store.clone());
    let rs = ServerAddress::new("10.0.0.5", 60020);
    master.set_root_region(MetaRegion::root(rs.clone()));

    let workers = spawn_workers(master.clone(), Arc::new(events), 2);
    let scanner = tokio::spawn(MetaScanner::new(master.clone()).run());

    let first = RegionInfo::new("meta", "", "tbl,m", 1);
    let second = RegionInfo::new("meta", "tbl,m", "", 2);
    master
        .report_region_open(first.clone(), ServerInfo::new(rs.clone(), 1))
        .unwrap();
    wait_until("first meta region online", || {
        master.registry().is_online(first.region_name())
    })
    .await;
    assert!(!master.registry().is_initial_scan_complete());

    master
        .report_region_open(second.clone(), ServerInfo::new(rs.clone(), 1))
        .unwrap();
    wait_until("initial scan complete", || {
        master.registry().is_initial_scan_complete()
    })
    .await;
    assert_eq!(master.registry().online_count(), 2);

    // user rows now route to the meta region covering them
    for (start, id) in [("aaa", 10), ("zzz", 11)] {
        master
            .report_region_open(
                RegionInfo::new("tbl", start, "", id),
                ServerInfo::new(rs.clone(), 1),
            )
            .unwrap();
    }
    wait_until("user regions recorded", || {
        master.registry().pending_regions().is_empty()
    })
    .await;
    assert_eq!(store.row_count(first.region_name()), 1);
    assert_eq!(store.row_count(second.region_name()), 1);

    master.registry().close_scan_queue();
    scanner.await.unwrap().unwrap();
    for worker in workers {
        worker.abort();
    }
}

#[tokio::test]
async fn test_scanner_waits_for_unreachable_meta_region() {
    let store = Arc::new(MemMetaStore::new());
    let (master, _events) = Master::new(config(1), store.clone());
    let region = MetaRegion::new(ServerAddress::new("rs1", 60020), "meta,,1", "", "");
    store.set_reachable(region.region_name(), false);

    let scanner = tokio::spawn(MetaScanner::new(master.clone()).run());
    master.registry().enqueue_for_scan(region.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!master.registry().is_online(region.region_name()));

    store.set_reachable(region.region_name(), true);
    wait_until("meta region online", || {
        master.registry().is_initial_scan_complete()
    })
    .await;
    assert!(master.registry().is_online(region.region_name()));

    master.registry().close_scan_queue();
    scanner.await.unwrap().unwrap();
}

#[test]
fn test_stop_row_bounds_meta_scan() {
    let store = MemMetaStore::new();
    let server = ServerInfo::new(ServerAddress::new("rs1", 60020), 1);
    for row in ["a", "m", "z"] {
        store
            .write(b"meta,,1", &MetaRecord::location(row, &server))
            .unwrap();
    }

    let rows: Vec<Vec<u8>> = store
        .scan(b"meta,,1", b"", &RowFilter::stop_row("m"))
        .unwrap()
        .iter()
        .map(|record| record.row().to_vec())
        .collect();
    assert_eq!(rows, vec![b"a".to_vec()]);

    let all = store.scan(b"meta,,1", b"", &RowFilter::PassAll).unwrap();
    assert_eq!(all.len(), 3);
}
