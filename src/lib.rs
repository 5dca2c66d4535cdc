//! Audio Downloader Pro - Core Library
//!
//! This library provides the core functionality for the audio downloader
//! application: the concurrent batch download pipeline, stream fetching with
//! progress reporting, ffmpeg-based remuxing and tag embedding, and the
//! progress relay consumed by the presentation layer.

pub mod core;

// Re-export commonly used types
pub use crate::core::{
    config::AppConfig,
    models::{
        AppError, AppResult, CancelSignal, DownloadRequest, LifecycleEvent, Metadata,
        ProgressMessage, StreamVariant, VideoDescriptor,
    },
    pipeline::{BatchHandle, DownloadPipeline},
    relay::{JobStatus, JobView, ProgressRelay},
};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes logging for embedding hosts. Safe to call more than once.
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "audio_downloader_pro=info");
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    tracing::info!("{} v{} initialized", NAME, VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
