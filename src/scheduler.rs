//! Scheduler Binding (C9) — cron-drives the pipeline (§4.9).
//!
//! A single `tokio-cron-scheduler` job wraps `Pipeline::run`. A tick that
//! fires while the previous run is still in flight is skipped and picked up
//! on the next scheduled slot rather than queued or dropped, which falls out
//! naturally from re-using the cron scheduler's own re-fire rather than a
//! manual retry queue.

use crate::engine::Pipeline;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct JobMeta {
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub enabled: bool,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    running: Arc<Mutex<()>>,
    meta: Arc<RwLock<JobMeta>>,
    cancel: CancellationToken,
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new(pipeline: Arc<Pipeline>, cron_expr: &str, cancel: CancellationToken) -> anyhow::Result<Self> {
        let inner = JobScheduler::new().await?;
        let running = Arc::new(Mutex::new(()));
        let meta = Arc::new(RwLock::new(JobMeta {
            enabled: true,
            ..Default::default()
        }));

        let job_pipeline = pipeline.clone();
        let job_running = running.clone();
        let job_meta = meta.clone();
        let job_cancel = cancel.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let pipeline = job_pipeline.clone();
            let running = job_running.clone();
            let meta = job_meta.clone();
            let cancel = job_cancel.clone();
            Box::pin(async move {
                run_once(&pipeline, &running, &meta, &cancel).await;
            })
        })?;
        inner.add(job).await?;

        Ok(Self {
            pipeline,
            running,
            meta,
            cancel,
            inner,
        })
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.inner.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Manual trigger (spec §4.9), guarded by the same singleton lock as the
    /// cron tick: a run already in flight causes this call to skip silently.
    pub async fn trigger_now(&self) {
        run_once(&self.pipeline, &self.running, &self.meta, &self.cancel).await;
    }

    pub async fn meta(&self) -> JobMeta {
        self.meta.read().await.clone()
    }
}

async fn run_once(pipeline: &Arc<Pipeline>, running: &Arc<Mutex<()>>, meta: &Arc<RwLock<JobMeta>>, cancel: &CancellationToken) {
    let Ok(_guard) = running.try_lock() else {
        log::info!("cleanup run already in progress, skipping this tick");
        return;
    };

    match pipeline.run(cancel).await {
        Ok(report) => {
            log::info!("cleanup run complete: {report:?}");
            let mut meta = meta.write().await;
            meta.last_run = Some(Utc::now());
            meta.run_count += 1;
            meta.last_error = None;
        }
        Err(e) => {
            log::warn!("cleanup run failed: {e:#}");
            let mut meta = meta.write().await;
            meta.last_run = Some(Utc::now());
            meta.error_count += 1;
            meta.last_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_meta_defaults_to_disabled() {
        let meta = JobMeta::default();
        assert!(!meta.enabled);
        assert_eq!(meta.run_count, 0);
        assert_eq!(meta.error_count, 0);
    }
}
