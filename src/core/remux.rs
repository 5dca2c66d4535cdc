//! Remux & tag stage
//!
//! Takes a fully downloaded raw stream, repackages it into the final
//! container with the external transcoder in copy-codec mode, then embeds
//! the scraped metadata and cover art. The output path is chosen
//! collision-free before the transcoder runs, and a partially written
//! output is always deleted before an error propagates, so callers never
//! see a corrupt file at the advertised final path. Cleaning up the raw
//! input is the caller's job, not this stage's.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::Tag;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::models::{AppError, AppResult, Metadata};

/// Maximum " (N)" disambiguation attempts before giving up.
const MAX_COLLISION_ATTEMPTS: usize = 5;

/// External media processing seam: container repackaging and tag embedding.
/// The production implementation shells out to ffmpeg and writes tags with
/// lofty; tests substitute an in-process stand-in.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Repackage `input` into `output` without re-encoding.
    async fn remux_copy(&self, input: &Path, output: &Path) -> AppResult<()>;

    /// Embed title, artist, album, year and cover art into the container at
    /// `path`. The cover is fetched from `metadata.cover_url` here, once,
    /// only for the winning output path.
    async fn write_tags(&self, path: &Path, metadata: &Metadata) -> AppResult<()>;
}

/// Production processor: ffmpeg subprocess + lofty tag writer.
pub struct FfmpegProcessor {
    ffmpeg_path: String,
    client: reqwest::Client,
}

impl FfmpegProcessor {
    pub fn new(ffmpeg_path: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            client,
        }
    }

    async fn fetch_cover(&self, url: &str) -> AppResult<Option<Vec<u8>>> {
        if url.is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::TagWrite(format!("cover fetch failed: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::TagWrite(format!("cover fetch failed: {e}")))?;

        Ok(Some(bytes.to_vec()))
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn remux_copy(&self, input: &Path, output: &Path) -> AppResult<()> {
        debug!("Remuxing {:?} -> {:?}", input, output);

        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .await
            .map_err(|e| {
                AppError::Transcode(format!("failed to run '{}': {}", self.ffmpeg_path, e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(AppError::Transcode(format!(
                "ffmpeg exited with {:?}: {}",
                result.status.code(),
                tail
            )));
        }

        Ok(())
    }

    async fn write_tags(&self, path: &Path, metadata: &Metadata) -> AppResult<()> {
        let cover = self.fetch_cover(&metadata.cover_url).await?;

        let path = path.to_path_buf();
        let metadata = metadata.clone();
        tokio::task::spawn_blocking(move || embed_tags(&path, &metadata, cover))
            .await
            .map_err(|e| AppError::TagWrite(format!("tag task panicked: {e}")))?
    }
}

/// Blocking lofty tag write.
fn embed_tags(path: &Path, metadata: &Metadata, cover: Option<Vec<u8>>) -> AppResult<()> {
    let mut tagged_file =
        lofty::read_from_path(path).map_err(|e| AppError::TagWrite(e.to_string()))?;

    if tagged_file.primary_tag_mut().is_none() {
        let tag_type = tagged_file.file_type().primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .primary_tag_mut()
        .ok_or_else(|| AppError::TagWrite("no writable tag slot".to_string()))?;

    tag.set_title(metadata.title.clone());
    tag.set_artist(metadata.author.clone());
    tag.set_album(metadata.album.clone());
    if let Ok(year) = metadata.year.parse::<u32>() {
        tag.set_year(year);
    }

    if let Some(bytes) = cover {
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Jpeg),
            None,
            bytes,
        ));
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| AppError::TagWrite(e.to_string()))?;

    Ok(())
}

/// Chooses a collision-free output path: `{base_name}.{extension}`, then
/// `{base_name} (N).{extension}` for N = 1..=5, then
/// [`AppError::TooManyCollisions`].
pub fn resolve_output_path(folder: &Path, base_name: &str, extension: &str) -> AppResult<PathBuf> {
    let mut candidate = folder.join(format!("{base_name}.{extension}"));
    let mut attempt = 0;

    while candidate.exists() {
        attempt += 1;
        if attempt > MAX_COLLISION_ATTEMPTS {
            return Err(AppError::TooManyCollisions(format!(
                "{base_name}.{extension}"
            )));
        }
        candidate = folder.join(format!("{base_name} ({attempt}).{extension}"));
    }

    Ok(candidate)
}

/// Remuxes `raw_audio` into `{output_folder}/{base_name}.{extension}` (with
/// collision disambiguation) and embeds `metadata`. Returns the final path.
pub async fn remux_and_tag(
    processor: &dyn MediaProcessor,
    raw_audio: &Path,
    output_folder: &Path,
    base_name: &str,
    extension: &str,
    metadata: &Metadata,
) -> AppResult<PathBuf> {
    let final_path = resolve_output_path(output_folder, base_name, extension)?;
    info!("Processing {:?} -> {:?}", raw_audio, final_path);

    let staged = async {
        processor.remux_copy(raw_audio, &final_path).await?;
        processor.write_tags(&final_path, metadata).await
    };

    if let Err(e) = staged.await {
        if final_path.exists() {
            warn!("Removing partial output {:?} after failure: {}", final_path, e);
            let _ = tokio::fs::remove_file(&final_path).await;
        }
        return Err(e);
    }

    Ok(final_path)
}
