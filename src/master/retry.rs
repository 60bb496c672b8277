//! Retrying executor for meta table operations
//!
//! Each attempt first checks that the target meta region is reachable. If it
//! is not, the owning event (when one is attached) is put back on the delayed
//! queue and the run ends as [`MetaOutcome::Deferred`]. Otherwise the wrapped
//! operation runs; transient store failures are retried with exponential
//! backoff until the attempt budget is spent.

use crate::common::{backoff_delay, display_key, Error, Result, RetryConfig};
use crate::master::event::RegionStatusEvent;
use crate::master::region::MetaRegion;
use crate::master::server::Master;
use std::future::Future;

/// Result of a meta operation that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaOutcome<T> {
    /// The operation ran against the meta region and returned a value
    Committed(T),
    /// The meta region was unreachable; nothing was written
    Deferred,
}

impl<T> MetaOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, MetaOutcome::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            MetaOutcome::Committed(value) => Some(value),
            MetaOutcome::Deferred => None,
        }
    }
}

/// Runs one operation against a meta region with retries.
pub struct RetryableMetaOperation<'a> {
    master: &'a Master,
    target: Option<MetaRegion>,
    requeue: Option<RegionStatusEvent>,
    policy: RetryConfig,
}

impl<'a> RetryableMetaOperation<'a> {
    /// `target` is `None` when the meta region holding the row is not known yet.
    pub fn new(target: Option<MetaRegion>, master: &'a Master) -> Self {
        Self {
            master,
            target,
            requeue: None,
            policy: master.config().retry.clone(),
        }
    }

    /// Put `event` on the delayed queue when the target is unreachable.
    pub fn requeue_on_unreachable(mut self, event: RegionStatusEvent) -> Self {
        self.requeue = Some(event);
        self
    }

    pub fn with_policy(mut self, policy: RetryConfig) -> Self {
        self.policy = policy;
        self
    }

    fn available_meta_region(&self) -> Option<MetaRegion> {
        self.target
            .as_ref()
            .filter(|target| self.master.store().is_reachable(target))
            .cloned()
    }

    fn defer(&self) {
        match &self.target {
            Some(target) => tracing::info!(
                meta_region = %display_key(target.region_name()),
                "meta region unreachable, deferring"
            ),
            None => tracing::info!("meta region not yet online, deferring"),
        }
        if let Some(event) = &self.requeue {
            self.master.events().defer(event.clone());
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent.
    pub async fn run_with_retries<T, F, Fut>(&self, mut op: F) -> Result<MetaOutcome<T>>
    where
        F: FnMut(MetaRegion) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let Some(meta_region) = self.available_meta_region() else {
                self.defer();
                return Ok(MetaOutcome::Deferred);
            };

            match op(meta_region).await {
                Ok(value) => return Ok(MetaOutcome::Committed(value)),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = backoff_delay(
                        self.policy.initial_backoff(),
                        attempt - 1,
                        self.policy.max_backoff(),
                    );
                    tracing::warn!(
                        "Meta operation attempt {}/{} failed: {}, retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MasterConfig;
    use crate::master::dispatcher::EventReceiver;
    use crate::master::metadata::MemMetaStore;
    use crate::master::region::{RegionInfo, ServerAddress, ServerInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn master() -> (Arc<Master>, Arc<MemMetaStore>, EventReceiver) {
        let config = MasterConfig {
            requeue_delay_ms: 5,
            retry: RetryConfig {
                max_attempts: 4,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
            },
            ..Default::default()
        };
        let store = Arc::new(MemMetaStore::new());
        let (master, events) = Master::new(config, store.clone());
        (master, store, events)
    }

    fn meta_region() -> MetaRegion {
        MetaRegion::new(ServerAddress::new("rs1", 60020), "meta,,1", "", "")
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let (master, _store, _events) = master();
        let attempts = AtomicUsize::new(0);

        let outcome = RetryableMetaOperation::new(Some(meta_region()), &master)
            .run_with_retries(|_| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::StoreUnavailable("meta,,1".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome, MetaOutcome::Committed(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let (master, _store, _events) = master();
        let attempts = AtomicUsize::new(0);

        let err = RetryableMetaOperation::new(Some(meta_region()), &master)
            .run_with_retries(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::StoreUnavailable("meta,,1".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let (master, _store, _events) = master();
        let attempts = AtomicUsize::new(0);

        let err = RetryableMetaOperation::new(Some(meta_region()), &master)
            .run_with_retries(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::ScanQueueInterrupted("meta,,1".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ScanQueueInterrupted(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_target_defers_event_once() {
        let (master, store, events) = master();
        store.set_reachable(b"meta,,1", false);
        let event = RegionStatusEvent::opened(
            RegionInfo::new("tbl", "aaa", "", 1000),
            ServerInfo::new(ServerAddress::new("10.0.0.5", 60020), 42),
        );

        let attempts = AtomicUsize::new(0);

        let outcome = RetryableMetaOperation::new(Some(meta_region()), &master)
            .requeue_on_unreachable(event.clone())
            .run_with_retries(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, MetaOutcome::Deferred);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert_eq!(master.events().deferred_count(), 1);
        let requeued = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(requeued.change().region(), event.change().region());
    }

    #[tokio::test]
    async fn test_unknown_target_defers() {
        let (master, _store, _events) = master();
        let outcome = RetryableMetaOperation::new(None, &master)
            .run_with_retries(|_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(outcome, MetaOutcome::Deferred);
        assert_eq!(master.events().deferred_count(), 0);
    }
}
