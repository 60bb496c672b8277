//! In-memory bookkeeping of region and meta-region state
//!
//! The registry tracks:
//! - regions whose location update is pending
//! - meta regions waiting for their first scan (bounded queue)
//! - meta regions that are online, ordered by start key
//! - regions closed for reassignment
//!
//! All state sits behind a single lock that is never held across an await.

use crate::common::{display_key, Error, Result};
use crate::master::region::{MetaRegion, RegionInfo};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};

#[derive(Default)]
struct RegistryState {
    pending: BTreeSet<Vec<u8>>,
    /// Every meta region ever queued for scan, by name
    queued: HashSet<Vec<u8>>,
    /// Queued and not yet handed to the scanner
    to_scan: BTreeMap<Vec<u8>, MetaRegion>,
    /// Handed to the scanner and not yet online
    scanning: HashMap<Vec<u8>, MetaRegion>,
    /// Online meta regions by start key
    online: BTreeMap<Vec<u8>, MetaRegion>,
    unassigned: BTreeMap<Vec<u8>, RegionInfo>,
}

/// Shared registry of pending regions and known meta regions
pub struct MetaRegistry {
    state: Mutex<RegistryState>,
    initial_scan_complete: AtomicBool,
    scan_tx: Mutex<Option<mpsc::Sender<MetaRegion>>>,
    scan_rx: tokio::sync::Mutex<mpsc::Receiver<MetaRegion>>,
    scan_closed: watch::Sender<bool>,
    span: tracing::Span,
}

impl MetaRegistry {
    pub fn new(scan_queue_capacity: usize, span: tracing::Span) -> Self {
        let (scan_tx, scan_rx) = mpsc::channel(scan_queue_capacity.max(1));
        let (scan_closed, _) = watch::channel(false);
        Self {
            state: Mutex::new(RegistryState::default()),
            initial_scan_complete: AtomicBool::new(false),
            scan_tx: Mutex::new(Some(scan_tx)),
            scan_rx: tokio::sync::Mutex::new(scan_rx),
            scan_closed,
            span,
        }
    }

    // === Bootstrap ===

    pub fn is_initial_scan_complete(&self) -> bool {
        self.initial_scan_complete.load(Ordering::Acquire)
    }

    pub fn complete_initial_scan(&self) {
        if !self.initial_scan_complete.swap(true, Ordering::AcqRel) {
            tracing::info!(parent: &self.span, "initial meta scan complete");
        }
    }

    // === Scan queue ===

    /// Queue a meta region for its first scan.
    ///
    /// A region is queued at most once. Reporting it again on another server
    /// replaces the handle held for it: in the queue, in the scanner's hands,
    /// or in the online set once its scan is done. Waits while the queue is
    /// full; fails with [`Error::ScanQueueInterrupted`] if the queue is closed
    /// before or during the wait.
    pub async fn enqueue_for_scan(&self, region: MetaRegion) -> Result<()> {
        let sender = {
            let mut state = self.state.lock();
            let name = region.region_name().to_vec();
            if !state.queued.insert(name.clone()) {
                if let Some(queued) = state.to_scan.get_mut(&name) {
                    tracing::debug!(parent: &self.span, %region, "replacing queued meta region");
                    *queued = region;
                } else if let Some(scanning) = state.scanning.get_mut(&name) {
                    tracing::debug!(parent: &self.span, %region, "replacing meta region under scan");
                    *scanning = region;
                } else {
                    tracing::debug!(parent: &self.span, %region, "meta region already scanned, updating online entry");
                    Self::put_online(&mut state, region);
                }
                return Ok(());
            }
            state.to_scan.insert(name, region.clone());
            self.scan_tx.lock().clone()
        };

        let name = region.region_name().to_vec();
        let mut closed = self.scan_closed.subscribe();
        let sent = match sender {
            Some(tx) => tokio::select! {
                biased;
                _ = closed.wait_for(|closed| *closed) => false,
                res = tx.send(region) => res.is_ok(),
            },
            None => false,
        };
        if !sent {
            self.state.lock().to_scan.remove(&name);
            return Err(Error::ScanQueueInterrupted(display_key(&name)));
        }
        Ok(())
    }

    /// Next meta region to scan; `None` once the queue is closed and drained.
    ///
    /// Returns the latest handle reported for the region, which may be newer
    /// than the one that was queued.
    pub async fn next_to_scan(&self) -> Option<MetaRegion> {
        let queued = self.scan_rx.lock().await.recv().await?;
        let mut state = self.state.lock();
        let region = state
            .to_scan
            .remove(queued.region_name())
            .unwrap_or(queued);
        state
            .scanning
            .insert(region.region_name().to_vec(), region.clone());
        Some(region)
    }

    /// Put a scanned meta region online under its latest handle.
    pub fn finish_scan(&self, region: MetaRegion) -> MetaRegion {
        let mut state = self.state.lock();
        let latest = state.scanning.remove(region.region_name()).unwrap_or(region);
        Self::put_online(&mut state, latest.clone());
        latest
    }

    /// Meta regions queued and not yet taken by the scanner
    pub fn regions_to_scan(&self) -> Vec<MetaRegion> {
        self.state.lock().to_scan.values().cloned().collect()
    }

    pub fn is_queued_for_scan(&self, region_name: &[u8]) -> bool {
        self.state.lock().to_scan.contains_key(region_name)
    }

    /// Close the scan queue; waiting and future enqueues fail as interrupted.
    pub fn close_scan_queue(&self) {
        self.scan_closed.send_replace(true);
        if self.scan_tx.lock().take().is_some() {
            tracing::info!(parent: &self.span, "meta scan queue closed");
        }
    }

    pub fn is_scan_queue_closed(&self) -> bool {
        *self.scan_closed.borrow()
    }

    // === Online meta regions ===

    /// Insert or replace an online meta region.
    pub fn mark_online(&self, region: MetaRegion) {
        Self::put_online(&mut self.state.lock(), region);
    }

    fn put_online(state: &mut RegistryState, region: MetaRegion) {
        // a later finish_scan must not bring back an older handle
        if let Some(queued) = state.to_scan.get_mut(region.region_name()) {
            *queued = region.clone();
        }
        if let Some(scanning) = state.scanning.get_mut(region.region_name()) {
            *scanning = region.clone();
        }
        state
            .online
            .retain(|_, m| m.region_name() != region.region_name());
        state.online.insert(region.start_key().to_vec(), region);
    }

    /// Take a meta region out of the online set; returns whether it was there.
    pub fn remove_online(&self, region_name: &[u8]) -> bool {
        let mut state = self.state.lock();
        let before = state.online.len();
        state.online.retain(|_, m| m.region_name() != region_name);
        state.online.len() != before
    }

    pub fn is_online(&self, region_name: &[u8]) -> bool {
        self.state
            .lock()
            .online
            .values()
            .any(|m| m.region_name() == region_name)
    }

    pub fn online_meta_regions(&self) -> Vec<MetaRegion> {
        self.state.lock().online.values().cloned().collect()
    }

    pub fn online_count(&self) -> usize {
        self.state.lock().online.len()
    }

    /// The online meta region whose rows include `row`: the one with the
    /// greatest start key not after it.
    pub fn meta_region_for_row(&self, row: &[u8]) -> Option<MetaRegion> {
        self.state
            .lock()
            .online
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(row)))
            .next_back()
            .map(|(_, m)| m.clone())
    }

    // === Pending regions ===

    /// Add a region to the pending set; returns whether it was newly added.
    pub fn add_pending(&self, region_name: &[u8]) -> bool {
        self.state.lock().pending.insert(region_name.to_vec())
    }

    /// Remove a region from the pending set; returns whether it was there.
    pub fn clear_pending(&self, region_name: &[u8]) -> bool {
        self.state.lock().pending.remove(region_name)
    }

    pub fn is_pending(&self, region_name: &[u8]) -> bool {
        self.state.lock().pending.contains(region_name)
    }

    pub fn pending_regions(&self) -> Vec<Vec<u8>> {
        self.state.lock().pending.iter().cloned().collect()
    }

    // === Unassigned regions ===

    pub fn set_unassigned(&self, region: RegionInfo) {
        self.state
            .lock()
            .unassigned
            .insert(region.region_name().to_vec(), region);
    }

    /// Hand a region back for assignment; returns it if it was unassigned.
    pub fn take_unassigned(&self, region_name: &[u8]) -> Option<RegionInfo> {
        self.state.lock().unassigned.remove(region_name)
    }

    pub fn is_unassigned(&self, region_name: &[u8]) -> bool {
        self.state.lock().unassigned.contains_key(region_name)
    }

    pub fn unassigned_regions(&self) -> Vec<RegionInfo> {
        self.state.lock().unassigned.values().cloned().collect()
    }
}
