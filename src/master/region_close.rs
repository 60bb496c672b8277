//! Processing of "region closed" reports

use crate::common::{display_key, Result};
use crate::master::event::{ProcessOutcome, RegionStatusChange, RegionStatusEvent};
use crate::master::metadata::{COL_SERVER, COL_STARTCODE};
use crate::master::region::MetaRegion;
use crate::master::retry::RetryableMetaOperation;
use crate::master::server::Master;

pub(crate) async fn process(
    master: &Master,
    event: &RegionStatusEvent,
    offline: bool,
    reassign: bool,
) -> Result<ProcessOutcome> {
    let change = event.change();
    tracing::info!(
        offline,
        reassign,
        "{} closed",
        change.region().region_name_as_string()
    );

    let outcome = RetryableMetaOperation::new(master.meta_region_for(change), master)
        .requeue_on_unreachable(event.clone())
        .run_with_retries(|meta_region| async move {
            release_region(master, change, offline, reassign, meta_region)
        })
        .await?;
    Ok(outcome.into())
}

fn release_region(
    master: &Master,
    change: &RegionStatusChange,
    offline: bool,
    reassign: bool,
    meta_region: MetaRegion,
) -> Result<()> {
    let region = change.region();
    let registry = master.registry();

    if offline || reassign {
        tracing::info!(
            "clearing location of row {} in region {}",
            region.region_name_as_string(),
            display_key(meta_region.region_name())
        );
        master.store().delete_columns(
            meta_region.region_name(),
            region.region_name(),
            &[COL_SERVER, COL_STARTCODE],
        )?;
        if change.is_meta_table() && registry.remove_online(region.region_name()) {
            tracing::debug!("Removed {} from online meta regions", region);
        }
    }

    // pending entries belong to open reports; a close never clears them
    if reassign {
        registry.set_unassigned(region.clone());
    }
    Ok(())
}
