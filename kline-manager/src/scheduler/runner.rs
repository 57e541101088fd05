//! Cadence scheduler
//!
//! Runs every cadence in its own task. A task sleeps until the next
//! occurrence, runs the cadence to completion and repeats. Shutdown only
//! interrupts the sleep, so an in-flight run always finishes first, and a
//! pending shutdown wins over a due run.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ingestion::{Cadence, IngestError, IngestResult, IngestionPipeline};

/// Drives the configured cadences until shutdown
pub struct IngestionScheduler {
    pipeline: Arc<IngestionPipeline>,
    cadences: Vec<Cadence>,
    shutdown_tx: broadcast::Sender<()>,
    /// Holds a stop requested before `run` subscribes the cadence tasks
    shutdown_rx: broadcast::Receiver<()>,
}

impl IngestionScheduler {
    pub fn new(pipeline: Arc<IngestionPipeline>, cadences: Vec<Cadence>) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Self {
            pipeline,
            cadences,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sender that stops the scheduler when signalled
    ///
    /// A stop sent at any point after construction is honored, including
    /// before `run` is called.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until shutdown is signalled or a cadence fails fatally
    ///
    /// Returns after every cadence task has exited. The first fatal error
    /// is returned; it also stops the remaining cadences.
    pub async fn run(mut self) -> IngestResult<()> {
        if self.cadences.is_empty() {
            return Err(IngestError::Configuration(
                "no cadences configured".to_string(),
            ));
        }

        // Subscribe before checking for an earlier stop so none is missed
        let receivers: Vec<_> = self
            .cadences
            .iter()
            .map(|_| self.shutdown_tx.subscribe())
            .collect();

        if !matches!(
            self.shutdown_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ) {
            info!("Shutdown requested before start, no cadence will run");
            return Ok(());
        }

        let handles: Vec<(String, JoinHandle<IngestResult<()>>)> = self
            .cadences
            .into_iter()
            .zip(receivers)
            .map(|(cadence, shutdown_rx)| {
                let name = cadence.name().to_string();
                let handle = tokio::spawn(run_cadence_loop(
                    Arc::clone(&self.pipeline),
                    cadence,
                    self.shutdown_tx.clone(),
                    shutdown_rx,
                ));
                (name, handle)
            })
            .collect();

        info!("Scheduler started with {} cadences", handles.len());

        let mut first_error = None;
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let _ = self.shutdown_tx.send(());
                    Err(IngestError::Task(format!("{}: {}", name, e)))
                }
            };
            if let Err(e) = outcome {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        info!("Scheduler stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn run_cadence_loop(
    pipeline: Arc<IngestionPipeline>,
    cadence: Cadence,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> IngestResult<()> {
    info!(
        "Cadence '{}' scheduled: {} ({}, retention {}h)",
        cadence.name(),
        cadence.schedule.expression,
        cadence.timeframe,
        cadence.retention.max_age_hours
    );

    loop {
        let Some((next, wait)) = cadence.schedule.next_run(Utc::now()) else {
            warn!("Cadence '{}' has no future occurrence, stopping", cadence.name());
            return Ok(());
        };
        debug!("Cadence '{}' next run at {}", cadence.name(), next);

        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                info!("Cadence '{}' stopping", cadence.name());
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if let Err(e) = pipeline.run_cadence(&cadence, Utc::now()).await {
            error!("Cadence '{}' failed: {}", cadence.name(), e);
            let _ = shutdown_tx.send(());
            return Err(e);
        }
    }
}
