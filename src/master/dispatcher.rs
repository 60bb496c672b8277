//! Event queue and the worker pool draining it
//!
//! Region servers' reports become [`RegionStatusEvent`]s on an unbounded
//! queue. Events that hit an unreachable meta region are put back on the
//! same queue after a delay.

use crate::common::{Error, Result};
use crate::master::event::RegionStatusEvent;
use crate::master::server::Master;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Sending side of the master's event queue
pub struct EventQueue {
    tx: mpsc::UnboundedSender<RegionStatusEvent>,
    requeue_delay: Duration,
    deferred: AtomicU64,
}

/// Receiving side, shared by all workers
pub struct EventReceiver {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RegionStatusEvent>>,
}

pub fn event_queue(requeue_delay: Duration) -> (EventQueue, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventQueue {
            tx,
            requeue_delay,
            deferred: AtomicU64::new(0),
        },
        EventReceiver {
            rx: tokio::sync::Mutex::new(rx),
        },
    )
}

impl EventQueue {
    pub fn submit(&self, event: RegionStatusEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|e| Error::Internal(format!("event queue closed, dropped {}", e.0)))
    }

    /// Put an event back on the queue once the requeue delay has passed.
    pub fn defer(&self, event: RegionStatusEvent) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
        let tx = self.tx.clone();
        let delay = self.requeue_delay;
        tracing::debug!(%event, ?delay, "deferring event");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tx.send(event) {
                tracing::warn!(event = %e.0, "event queue closed, deferred event dropped");
            }
        });
    }

    /// Number of events deferred so far
    pub fn deferred_count(&self) -> u64 {
        self.deferred.load(Ordering::Relaxed)
    }
}

impl EventReceiver {
    pub async fn recv(&self) -> Option<RegionStatusEvent> {
        self.rx.lock().await.recv().await
    }
}

/// Start `workers` tasks that process events until the queue closes.
///
/// A failed event is logged and dropped; its region stays in the pending set.
pub fn spawn_workers(
    master: Arc<Master>,
    events: Arc<EventReceiver>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    (0..workers.max(1))
        .map(|id| {
            let master = master.clone();
            let events = events.clone();
            let span = tracing::info_span!(parent: master.span(), "worker", id);
            tokio::spawn(
                async move {
                    while let Some(event) = events.recv().await {
                        match event.process(&master).await {
                            Ok(outcome) => tracing::debug!(%event, ?outcome, "event processed"),
                            Err(e) => tracing::error!(
                                %event,
                                error = %e,
                                "failed to process event, region stays pending"
                            ),
                        }
                    }
                    tracing::debug!("event queue closed, worker exiting");
                }
                .instrument(span),
            )
        })
        .collect()
}
