//! Metadata resolver
//!
//! Derives the tag metadata for one video from its descriptor. Music uploads
//! on the platform carry an auto-generated, line-structured description; when
//! that marker is present the title/artist/album/year are scraped from the
//! description, otherwise the descriptor's own fields are used directly.
//! A malformed structured description always falls back to the descriptor
//! fields instead of failing.

use tracing::debug;

use crate::core::models::{Metadata, VideoDescriptor};

/// Marker the platform appends as the last description line of music uploads.
const AUTO_GENERATED_MARKER: &str = "Auto-generated by YouTube.";

/// Separator between title and artists in structured descriptions.
const ARTIST_SEPARATOR: &str = " · ";

/// Prefix of the structured release-date line.
const RELEASED_ON_PREFIX: &str = "Released on: ";

/// Resolves tag metadata for the given video.
pub fn resolve_metadata(video: &VideoDescriptor) -> Metadata {
    let lines: Vec<&str> = video.description.lines().collect();

    let structured = lines
        .last()
        .map(|last| last.contains(AUTO_GENERATED_MARKER))
        .unwrap_or(false);

    let (title, artist, album, year) = if structured {
        match parse_structured(&lines, video) {
            Some(parsed) => {
                debug!("Description for '{}' was auto generated", video.id);
                parsed
            }
            None => {
                debug!(
                    "Structured description for '{}' was malformed, using descriptor fields",
                    video.id
                );
                unstructured(video)
            }
        }
    } else {
        unstructured(video)
    };

    Metadata {
        title,
        // Normalizes multi-artist lists.
        author: artist.replace(ARTIST_SEPARATOR, "; "),
        album,
        year,
        cover_url: video.thumbnail_url.clone(),
    }
}

/// Scrapes (title, artist, album, year) out of an auto-generated description.
/// Returns None when the expected lines are missing.
fn parse_structured(
    lines: &[&str],
    video: &VideoDescriptor,
) -> Option<(String, String, String, String)> {
    if lines.len() < 5 {
        return None;
    }

    let (title, artist) = lines[2].split_once(ARTIST_SEPARATOR)?;
    let album = lines[4];

    let year = lines
        .iter()
        .find(|line| line.contains(RELEASED_ON_PREFIX))
        .and_then(|line| line.split_once(": "))
        .and_then(|(_, date)| date.split('-').next())
        .map(str::to_string)
        .filter(|year| !year.is_empty())
        .unwrap_or_else(|| publish_year(video));

    Some((
        title.to_string(),
        artist.to_string(),
        album.to_string(),
        year,
    ))
}

fn unstructured(video: &VideoDescriptor) -> (String, String, String, String) {
    (
        video.title.clone(),
        video.author.clone(),
        String::new(),
        publish_year(video),
    )
}

fn publish_year(video: &VideoDescriptor) -> String {
    use chrono::Datelike;
    video.publish_date.year().to_string()
}
