//! Batch download pipeline
//!
//! Owns the collaborator seams (stream opener, media processor) and turns a
//! batch of requests into a pool of concurrent jobs. Concurrency is bounded
//! with a semaphore; every job reports on one shared unbounded channel whose
//! receiver is handed back to the caller for relaying.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::info;

use crate::core::fetcher::{HttpStreamOpener, StreamOpener};
use crate::core::job::{run_download_job, JobContext};
use crate::core::models::{CancelSignal, DownloadRequest, ProgressMessage};
use crate::core::remux::{FfmpegProcessor, MediaProcessor};

/// Default floor between successive progress emissions per job.
const DEFAULT_MIN_EMIT_INTERVAL: Duration = Duration::from_millis(500);

pub struct DownloadPipeline {
    opener: Arc<dyn StreamOpener>,
    processor: Arc<dyn MediaProcessor>,
    min_emit_interval: Duration,
}

impl DownloadPipeline {
    /// Production pipeline: HTTP stream fetches, ffmpeg remuxing.
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        let client = reqwest::Client::new();
        Self {
            opener: Arc::new(HttpStreamOpener::new(client.clone())),
            processor: Arc::new(FfmpegProcessor::new(ffmpeg_path, client)),
            min_emit_interval: DEFAULT_MIN_EMIT_INTERVAL,
        }
    }

    /// Pipeline with substituted collaborators, used by tests.
    pub fn with_collaborators(
        opener: Arc<dyn StreamOpener>,
        processor: Arc<dyn MediaProcessor>,
        min_emit_interval: Duration,
    ) -> Self {
        Self {
            opener,
            processor,
            min_emit_interval,
        }
    }

    /// Spawns one job per request, at most `concurrency` running at once.
    /// Returns immediately; progress arrives on the returned receiver and
    /// completion is tracked through the [`BatchHandle`].
    pub fn submit_batch(
        &self,
        requests: Vec<DownloadRequest>,
        concurrency: usize,
        cancel: CancelSignal,
    ) -> (BatchHandle, UnboundedReceiver<ProgressMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let jobs_total = requests.len();
        let jobs_finished = Arc::new(AtomicUsize::new(0));

        info!(
            "Submitting batch of {} jobs, concurrency {}",
            jobs_total, concurrency
        );

        let mut handles = Vec::with_capacity(jobs_total);
        for request in requests {
            let ctx = JobContext {
                job_id: uuid::Uuid::new_v4().to_string(),
                request,
                events: tx.clone(),
                cancel: cancel.clone(),
                opener: self.opener.clone(),
                processor: self.processor.clone(),
                min_emit_interval: self.min_emit_interval,
            };
            let semaphore = semaphore.clone();
            let jobs_finished = jobs_finished.clone();

            handles.push(tokio::spawn(async move {
                // The semaphore is never closed while workers hold it.
                let _permit = semaphore.acquire_owned().await.ok();
                run_download_job(ctx).await;
                jobs_finished.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let handle = BatchHandle {
            jobs_total,
            jobs_finished,
            cancel,
            handles: Mutex::new(handles),
        };
        (handle, rx)
    }
}

/// Caller-side view of one submitted batch.
pub struct BatchHandle {
    jobs_total: usize,
    jobs_finished: Arc<AtomicUsize>,
    cancel: CancelSignal,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BatchHandle {
    pub fn jobs_total(&self) -> usize {
        self.jobs_total
    }

    pub fn jobs_finished(&self) -> usize {
        self.jobs_finished.load(Ordering::SeqCst)
    }

    /// True once every job has emitted `thread finished`.
    pub fn is_drained(&self) -> bool {
        self.jobs_finished() >= self.jobs_total
    }

    /// Requests cooperative cancellation of the whole batch. In-flight jobs
    /// stop at their next check point; queued jobs end immediately.
    pub fn cancel(&self) {
        info!("Batch cancellation requested");
        self.cancel.set();
    }

    /// Waits for every worker to finish.
    pub async fn wait(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_batch_is_immediately_drained() {
        let pipeline = DownloadPipeline::new("ffmpeg");
        let (handle, mut rx) = pipeline.submit_batch(Vec::new(), 2, CancelSignal::new());

        assert_eq!(handle.jobs_total(), 0);
        assert!(handle.is_drained());
        assert!(rx.try_recv().is_err());
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_cancel_sets_the_shared_signal() {
        let pipeline = DownloadPipeline::new("ffmpeg");
        let cancel = CancelSignal::new();
        let (handle, _rx) = pipeline.submit_batch(Vec::new(), 1, cancel.clone());

        assert!(!cancel.is_set());
        handle.cancel();
        assert!(cancel.is_set());
    }
}
