//! Chunked stream fetcher
//!
//! Copies one remote media stream into a local sink chunk by chunk, polling
//! the batch cancel signal before every read and reporting percentage
//! progress at a bounded rate. Faults never escape this boundary: the
//! outcome enum tells the calling job what happened and the job decides how
//! to surface it.
//!
//! The remote side is abstracted behind [`ChunkSource`] / [`StreamOpener`]
//! so the pipeline can be exercised without network access; the production
//! implementation streams over HTTP via reqwest.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::core::models::{
    AppError, AppResult, CancelSignal, LifecycleEvent, ProgressMessage, StreamVariant,
};

/// An open, readable remote stream delivering its bytes in chunks.
#[async_trait]
pub trait ChunkSource: Send {
    /// Total byte size of the stream.
    fn total_size(&self) -> u64;

    /// Next chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> AppResult<Option<Bytes>>;
}

/// Turns a stream variant into an open [`ChunkSource`].
#[async_trait]
pub trait StreamOpener: Send + Sync {
    async fn open(&self, variant: &StreamVariant) -> AppResult<Box<dyn ChunkSource>>;
}

/// Production opener: HTTP GET with a streaming response body.
pub struct HttpStreamOpener {
    client: reqwest::Client,
}

impl HttpStreamOpener {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamOpener for HttpStreamOpener {
    async fn open(&self, variant: &StreamVariant) -> AppResult<Box<dyn ChunkSource>> {
        let response = self
            .client
            .get(&variant.url)
            .send()
            .await?
            .error_for_status()?;

        // The catalog's size wins when the server does not report one.
        let total = response.content_length().unwrap_or(variant.filesize);

        Ok(Box::new(HttpChunkSource {
            total,
            stream: response.bytes_stream().boxed(),
        }))
    }
}

struct HttpChunkSource {
    total: u64,
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    fn total_size(&self) -> u64 {
        self.total
    }

    async fn next_chunk(&mut self) -> AppResult<Option<Bytes>> {
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(AppError::Network(e)),
            None => Ok(None),
        }
    }
}

/// What happened to a single stream transfer.
#[derive(Debug)]
pub enum FetchOutcome {
    Completed,
    Canceled,
    Failed(AppError),
}

fn percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        100
    } else {
        (downloaded.saturating_mul(100) / total).min(100) as u8
    }
}

/// Copies `source` into `sink`, emitting `started stream`, rate-limited
/// `progress` values and `completed stream` for `job_id` on `events`.
///
/// The cancel signal is polled before each chunk read; a set signal returns
/// [`FetchOutcome::Canceled`] immediately with no partial-success path. The
/// final progress value is always emitted, so a completed transfer ends at
/// 100 before `completed stream`.
///
/// Known limitation: there is no read timeout, so an unresponsive remote
/// stalls the calling worker until the connection drops.
pub async fn fetch_stream<W>(
    source: &mut dyn ChunkSource,
    sink: &mut W,
    cancel: &CancelSignal,
    events: &UnboundedSender<ProgressMessage>,
    job_id: &str,
    min_emit_interval: Duration,
) -> FetchOutcome
where
    W: AsyncWrite + Unpin + Send,
{
    if cancel.is_set() {
        return FetchOutcome::Canceled;
    }

    let total = source.total_size();
    let mut downloaded: u64 = 0;
    let mut last_emit = Instant::now();

    let _ = events.send(ProgressMessage::event(job_id, LifecycleEvent::StartedStream));
    let _ = events.send(ProgressMessage::progress(job_id, 0));

    loop {
        if cancel.is_set() {
            debug!("Stream fetch for job {} canceled mid-transfer", job_id);
            return FetchOutcome::Canceled;
        }

        let chunk = match source.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                warn!("Stream read failed for job {}: {}", job_id, e);
                return FetchOutcome::Failed(e);
            }
        };

        if let Err(e) = sink.write_all(&chunk).await {
            warn!("Stream write failed for job {}: {}", job_id, e);
            return FetchOutcome::Failed(e.into());
        }
        downloaded += chunk.len() as u64;

        if last_emit.elapsed() >= min_emit_interval {
            last_emit = Instant::now();
            let _ = events.send(ProgressMessage::progress(job_id, percent(downloaded, total)));
        }
    }

    if let Err(e) = sink.flush().await {
        return FetchOutcome::Failed(e.into());
    }

    // Final value regardless of the emit interval, so a full transfer always
    // reports 100 before the completion event.
    let _ = events.send(ProgressMessage::progress(job_id, percent(downloaded, total)));
    let _ = events.send(ProgressMessage::event(
        job_id,
        LifecycleEvent::CompletedStream,
    ));

    debug!("Stream fetch for job {} completed ({} bytes)", job_id, downloaded);
    FetchOutcome::Completed
}
