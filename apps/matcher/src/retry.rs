//! Background retry sweep over resumes whose last parse attempt failed.
//!
//! The sweep is a cancellable scheduled task: it ticks at a configurable
//! interval (first tick fires immediately), re-evaluates every filename
//! the sink still records as failed, and stops promptly when the handle
//! signals shutdown. Re-running an item is always safe because evaluation
//! is idempotent at the core level; the failure record's retry counter is
//! the only thing that moves on a repeated failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::llm::LlmProvider;
use crate::matching::evaluate_and_persist;
use crate::sink::PersistenceSink;

pub struct RetrySweep {
    pub interval: Duration,
    pub jd_text: String,
    pub resume_dir: PathBuf,
}

/// Handle to a running sweep. Dropping it without calling [`shutdown`]
/// leaves the task running for the life of the runtime.
///
/// [`shutdown`]: SweepHandle::shutdown
pub struct SweepHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signals the sweep to stop and waits for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// Spawns the sweep on the current runtime.
pub fn spawn(
    sweep: RetrySweep,
    llm: Arc<dyn LlmProvider>,
    sink: Arc<dyn PersistenceSink>,
) -> SweepHandle {
    let (stop, mut stopped) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = sweep_once(&sweep, llm.as_ref(), sink.as_ref()).await {
                        error!("retry sweep failed: {err:#}");
                    }
                }
                _ = stopped.changed() => break,
            }
        }
    });
    SweepHandle { stop, task }
}

async fn sweep_once(
    sweep: &RetrySweep,
    llm: &dyn LlmProvider,
    sink: &dyn PersistenceSink,
) -> Result<()> {
    let failed = sink.failed_filenames().await?;
    if failed.is_empty() {
        return Ok(());
    }
    info!("retrying {} previously failed resumes", failed.len());
    for filename in failed {
        let path = sweep.resume_dir.join(&filename);
        if !path.is_file() {
            debug!(%filename, "source file no longer present, skipping");
            continue;
        }
        if let Err(err) = evaluate_and_persist(&sweep.jd_text, &path, None, llm, sink).await {
            error!(%filename, "retry failed: {err:#}");
        }
    }
    Ok(())
}
