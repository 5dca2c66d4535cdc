//! Core data models for the audio downloader
//!
//! Holds the immutable input descriptors, the progress-message schema shared
//! between download workers and the UI-facing relay, and the application
//! error taxonomy.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One fetchable media substream of a source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamVariant {
    /// MIME type, e.g. "audio/mp4" or "video/mp4".
    pub mime_type: String,
    /// Codec tag, e.g. "mp4a.40.2".
    pub codec: String,
    /// Whether this is an adaptive (single-track) stream.
    pub adaptive: bool,
    /// Resolution label for video variants, e.g. "1080p".
    pub resolution: Option<String>,
    /// Total byte size reported by the catalog.
    pub filesize: u64,
    /// Direct fetch URL.
    pub url: String,
    /// Average bitrate in bits per second, if known.
    pub average_bitrate: Option<u64>,
}

impl StreamVariant {
    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}

/// Immutable identity for one remote video, produced once by the
/// video-platform catalog lookup and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub publish_date: chrono::DateTime<chrono::Utc>,
    /// Free-text description; may be empty when the catalog could not
    /// provide one.
    pub description: String,
    pub streams: Vec<StreamVariant>,
    pub thumbnail_url: String,
}

impl VideoDescriptor {
    /// Picks the best audio-only variant: "audio/mp4" preferred, highest
    /// average bitrate first, byte size as the tie breaker.
    pub fn best_audio_stream(&self) -> Option<&StreamVariant> {
        self.streams
            .iter()
            .filter(|s| s.is_audio())
            .max_by_key(|s| {
                (
                    s.mime_type == "audio/mp4",
                    s.average_bitrate.unwrap_or(0),
                    s.filesize,
                )
            })
    }
}

/// Tag metadata derived once per job and consumed by the remux & tag stage.
/// The cover is carried as an opaque URL; it is only fetched at tagging time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub album: String,
    pub year: String,
    pub cover_url: String,
}

/// One user-committed download, owned exclusively by its job until terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Position of the video in the batch as shown to the user.
    pub sequence: usize,
    pub video: VideoDescriptor,
    pub audio_only: bool,
    pub output_folder: PathBuf,
}

/// Named lifecycle signal marking a job's transition between states.
///
/// The serde names are the wire strings consumed by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    #[serde(rename = "thread started")]
    ThreadStarted,
    #[serde(rename = "finding streams")]
    FindingStreams,
    #[serde(rename = "started download")]
    StartedDownload,
    #[serde(rename = "started stream")]
    StartedStream,
    #[serde(rename = "completed stream")]
    CompletedStream,
    #[serde(rename = "completed download")]
    CompletedDownload,
    #[serde(rename = "started processing")]
    StartedProcessing,
    #[serde(rename = "completed processing")]
    CompletedProcessing,
    #[serde(rename = "canceled")]
    Canceled,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "thread finished")]
    ThreadFinished,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::ThreadStarted => "thread started",
            LifecycleEvent::FindingStreams => "finding streams",
            LifecycleEvent::StartedDownload => "started download",
            LifecycleEvent::StartedStream => "started stream",
            LifecycleEvent::CompletedStream => "completed stream",
            LifecycleEvent::CompletedDownload => "completed download",
            LifecycleEvent::StartedProcessing => "started processing",
            LifecycleEvent::CompletedProcessing => "completed processing",
            LifecycleEvent::Canceled => "canceled",
            LifecycleEvent::Error => "error",
            LifecycleEvent::ThreadFinished => "thread finished",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a progress message: either a lifecycle event or a 0-100
/// progress percentage. Serializes as `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MessageBody {
    Event(LifecycleEvent),
    Progress(u8),
}

/// One message on the worker-to-relay channel. Serializes to the wire shape
/// `{"type": "event"|"progress", "value": ..., "job_id": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub job_id: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl ProgressMessage {
    pub fn event(job_id: &str, event: LifecycleEvent) -> Self {
        Self {
            job_id: job_id.to_string(),
            body: MessageBody::Event(event),
        }
    }

    pub fn progress(job_id: &str, percent: u8) -> Self {
        Self {
            job_id: job_id.to_string(),
            body: MessageBody::Progress(percent),
        }
    }
}

/// Shared cooperative cancellation flag for one batch.
///
/// Cancellation is polled, never preemptive: workers check it at
/// state-transition boundaries and before each chunk read.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("download canceled")]
    Canceled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no audio stream available for video '{0}'")]
    NoAudioStream(String),

    #[error("too many files named '{0}'")]
    TooManyCollisions(String),

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("tag write failed: {0}")]
    TagWrite(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
