//! Core business logic module
//!
//! Contains the download pipeline, its collaborator seams and the data
//! models shared between the workers and the presentation-facing relay.

pub mod config;
pub mod fetcher;
pub mod filename;
pub mod job;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod relay;
pub mod remux;


// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::{BatchHandle, DownloadPipeline};
pub use relay::ProgressRelay;
