//! Single download job
//!
//! Drives one request through its whole lifecycle: stream discovery,
//! download, remux & tag, cleanup. Every transition is reported on the
//! shared progress channel; exactly one terminal event (`completed
//! processing`, `canceled` or `error`) is emitted per job, and
//! `thread finished` is always the last message, after the job's temp
//! files have been removed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::core::fetcher::{fetch_stream, FetchOutcome, StreamOpener};
use crate::core::filename::sanitize_file_name;
use crate::core::metadata::resolve_metadata;
use crate::core::models::{
    AppError, CancelSignal, DownloadRequest, LifecycleEvent, ProgressMessage,
};
use crate::core::remux::{remux_and_tag, MediaProcessor};

/// Everything one job needs to run to completion on its own.
pub struct JobContext {
    pub job_id: String,
    pub request: DownloadRequest,
    pub events: UnboundedSender<ProgressMessage>,
    pub cancel: CancelSignal,
    pub opener: Arc<dyn StreamOpener>,
    pub processor: Arc<dyn MediaProcessor>,
    pub min_emit_interval: Duration,
}

enum JobEnd {
    Completed,
    Canceled,
    Failed(AppError),
}

/// Runs one job end to end. Never returns an error: every outcome is
/// reported on the progress channel instead.
pub async fn run_download_job(ctx: JobContext) {
    let JobContext {
        job_id,
        request,
        events,
        cancel,
        opener,
        processor,
        min_emit_interval,
    } = ctx;

    let _ = events.send(ProgressMessage::event(&job_id, LifecycleEvent::ThreadStarted));

    let end = run_stages(
        &job_id,
        &request,
        &events,
        &cancel,
        opener.as_ref(),
        processor.as_ref(),
        min_emit_interval,
    )
    .await;

    let terminal = match end {
        JobEnd::Completed => {
            info!("Job {} completed: {}", job_id, request.video.title);
            LifecycleEvent::CompletedProcessing
        }
        JobEnd::Canceled => {
            info!("Job {} canceled", job_id);
            LifecycleEvent::Canceled
        }
        JobEnd::Failed(e) => {
            error!("Job {} failed: {}", job_id, e);
            LifecycleEvent::Error
        }
    };
    let _ = events.send(ProgressMessage::event(&job_id, terminal));

    remove_temp_files(&request.output_folder, &job_id).await;

    let _ = events.send(ProgressMessage::event(&job_id, LifecycleEvent::ThreadFinished));
}

async fn run_stages(
    job_id: &str,
    request: &DownloadRequest,
    events: &UnboundedSender<ProgressMessage>,
    cancel: &CancelSignal,
    opener: &dyn StreamOpener,
    processor: &dyn MediaProcessor,
    min_emit_interval: Duration,
) -> JobEnd {
    if !request.audio_only {
        return JobEnd::Failed(AppError::NotImplemented(
            "video downloads are not supported".to_string(),
        ));
    }
    if cancel.is_set() {
        return JobEnd::Canceled;
    }

    let _ = events.send(ProgressMessage::event(job_id, LifecycleEvent::FindingStreams));

    let metadata = resolve_metadata(&request.video);
    let Some(stream) = request.video.best_audio_stream() else {
        return JobEnd::Failed(AppError::NoAudioStream(request.video.url.clone()));
    };

    let _ = events.send(ProgressMessage::event(job_id, LifecycleEvent::StartedDownload));

    let raw_path = request.output_folder.join(format!("{job_id}-a.mp4"));
    let mut source = match opener.open(stream).await {
        Ok(source) => source,
        Err(e) => return JobEnd::Failed(e),
    };
    let mut file = match tokio::fs::File::create(&raw_path).await {
        Ok(file) => file,
        Err(e) => return JobEnd::Failed(AppError::Io(e)),
    };

    match fetch_stream(
        source.as_mut(),
        &mut file,
        cancel,
        events,
        job_id,
        min_emit_interval,
    )
    .await
    {
        FetchOutcome::Completed => {}
        FetchOutcome::Canceled => return JobEnd::Canceled,
        FetchOutcome::Failed(e) => return JobEnd::Failed(e),
    }
    drop(file);

    let _ = events.send(ProgressMessage::event(
        job_id,
        LifecycleEvent::CompletedDownload,
    ));
    let _ = events.send(ProgressMessage::event(
        job_id,
        LifecycleEvent::StartedProcessing,
    ));

    let base_name = format!(
        "{} - {}",
        sanitize_file_name(&metadata.title),
        sanitize_file_name(&metadata.author)
    );
    match remux_and_tag(
        processor,
        &raw_path,
        &request.output_folder,
        &base_name,
        "m4a",
        &metadata,
    )
    .await
    {
        Ok(final_path) => {
            info!("Job {} wrote {:?}", job_id, final_path);
            JobEnd::Completed
        }
        Err(e) => JobEnd::Failed(e),
    }
}

/// Removes the job's namespaced temp files if present. Missing files are
/// fine; anything else is logged and ignored so cleanup never masks the
/// job's real outcome.
async fn remove_temp_files(folder: &Path, job_id: &str) {
    for suffix in ["a", "v"] {
        let path = folder.join(format!("{job_id}-{suffix}.mp4"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {:?}: {}", path, e),
        }
    }
}
