//! Background snapshot flusher.
//!
//! Flushes the registry on a fixed interval and on demand. Cancelling the
//! shutdown token stops the loop after one final flush.

use crate::registry::{FlushReport, Registry};
use crate::sink::SnapshotSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Control handle for a running [`Flusher`].
#[derive(Debug, Clone)]
pub struct FlushHandle {
    trigger: Arc<Notify>,
    shutdown: CancellationToken,
}

impl FlushHandle {
    /// Requests a flush without waiting for the next tick.
    pub fn flush_now(&self) {
        self.trigger.notify_one();
    }

    /// Stops the flusher after a final flush.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Periodically hands dirty sites to a snapshot sink.
pub struct Flusher {
    registry: Arc<Registry>,
    sink: Arc<dyn SnapshotSink>,
    interval: Duration,
    trigger: Arc<Notify>,
    shutdown: CancellationToken,
}

impl Flusher {
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn SnapshotSink>, interval: Duration) -> Self {
        Self {
            registry,
            sink,
            interval,
            trigger: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> FlushHandle {
        FlushHandle {
            trigger: Arc::clone(&self.trigger),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Spawns the flush loop on the current runtime.
    pub fn spawn(self) -> (FlushHandle, JoinHandle<FlushReport>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Runs until shutdown and returns the report of the final flush.
    pub async fn run(self) -> FlushReport {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(interval = ?self.interval, "flusher started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.trigger.notified() => debug!("on-demand flush"),
                _ = ticker.tick() => {}
            }
            let report = self.registry.flush(self.sink.as_ref()).await;
            if report.stored > 0 || report.failed > 0 {
                debug!(stored = report.stored, failed = report.failed, "flush pass");
            }
        }

        let report = self.registry.flush(self.sink.as_ref()).await;
        info!(
            stored = report.stored,
            failed = report.failed,
            "final flush complete, flusher stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::RecordingProvisioner;
    use crate::registry::CreateChassis;
    use crate::sink::MemorySink;
    use aolt_model::ProvisioningEndpoint;
    use aolt_types::SiteId;

    async fn registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::new(Arc::new(RecordingProvisioner::new())));
        registry
            .create_chassis(CreateChassis {
                site: SiteId::new("SITE1").unwrap(),
                endpoint: ProvisioningEndpoint::new(
                    "10.0.0.1:9000".parse().unwrap(),
                    "xosadmin",
                    "pw",
                ),
                rack: 1,
                shelf: 1,
            })
            .await
            .unwrap();
        registry
    }

    async fn wait_for(sink: &MemorySink) {
        for _ in 0..200 {
            if !sink.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sink never received a snapshot");
    }

    #[tokio::test]
    async fn test_shutdown_performs_final_flush() {
        let registry = registry().await;
        let sink = Arc::new(MemorySink::new());
        let flusher = Flusher::new(registry.clone(), sink.clone(), Duration::from_secs(3600));
        let (handle, task) = flusher.spawn();

        handle.shutdown();
        assert!(handle.is_shutdown());
        let report = task.await.unwrap();
        assert_eq!(report.stored, 1);
        assert_eq!(sink.len(), 1);
        assert!(registry.dirty_sites().await.is_empty());
    }

    #[tokio::test]
    async fn test_flush_now() {
        let registry = registry().await;
        let sink = Arc::new(MemorySink::new());
        let flusher = Flusher::new(registry.clone(), sink.clone(), Duration::from_secs(3600));
        let (handle, task) = flusher.spawn();

        handle.flush_now();
        wait_for(&sink).await;
        assert!(registry.dirty_sites().await.is_empty());

        handle.shutdown();
        let report = task.await.unwrap();
        assert_eq!(report.stored, 0);
        assert_eq!(report.clean, 1);
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let registry = registry().await;
        let sink = Arc::new(MemorySink::new());
        let flusher = Flusher::new(registry.clone(), sink.clone(), Duration::from_millis(20));
        let (handle, task) = flusher.spawn();

        wait_for(&sink).await;
        handle.shutdown();
        task.await.unwrap();
    }
}
