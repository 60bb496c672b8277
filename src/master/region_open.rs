//! Processing of "region opened" reports
//!
//! Applies to all meta and user regions; the root region is handled
//! elsewhere.

use crate::common::{display_key, Result};
use crate::master::event::{ProcessOutcome, RegionStatusChange, RegionStatusEvent};
use crate::master::metadata::MetaRecord;
use crate::master::region::{MetaRegion, ServerInfo};
use crate::master::retry::RetryableMetaOperation;
use crate::master::server::Master;

pub(crate) async fn process(
    master: &Master,
    event: &RegionStatusEvent,
    server: &ServerInfo,
) -> Result<ProcessOutcome> {
    let change = event.change();
    tracing::info!(
        "{} open on {}",
        change.region().region_name_as_string(),
        server.address()
    );

    let outcome = RetryableMetaOperation::new(master.meta_region_for(change), master)
        .requeue_on_unreachable(event.clone())
        .run_with_retries(|meta_region| update_location(master, change, server, meta_region))
        .await?;
    Ok(outcome.into())
}

/// Record the region's new location in meta, then update the registry.
async fn update_location(
    master: &Master,
    change: &RegionStatusChange,
    server: &ServerInfo,
    meta_region: MetaRegion,
) -> Result<()> {
    let region = change.region();
    tracing::info!(
        "updating row {} in region {} with startcode {} and server {}",
        region.region_name_as_string(),
        display_key(meta_region.region_name()),
        server.start_code(),
        server.address()
    );

    let record = MetaRecord::location(region.region_name(), server);
    master.store().write(meta_region.region_name(), &record)?;

    if change.is_meta_table() {
        let opened = MetaRegion::from_region(region, server.address().clone());
        let registry = master.registry();
        if !registry.is_initial_scan_complete() {
            tracing::debug!("Adding {} to regions to scan", opened);
            registry.enqueue_for_scan(opened).await?;
        } else {
            tracing::debug!("Adding to online meta regions: {}", opened);
            registry.mark_online(opened);
        }
    }

    master.registry().clear_pending(region.region_name());
    Ok(())
}
