//! Output format normalisation and media classification.

use serde::{Deserialize, Serialize};

/// Media family of an output format, used to pick the artifact store location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Classify a format name. Unknown formats return `None`.
    pub fn from_format(format: &str) -> Option<Self> {
        match actual_extension(format).as_str() {
            "webp" | "jpeg" | "png" | "jpg" | "gif" => Some(MediaKind::Image),
            "mp4" | "mkv" | "avi" | "mov" | "webm" | "mpeg" | "ts" | "mts" | "m4v" | "ogv" => {
                Some(MediaKind::Video)
            }
            "mp3" | "aac" | "wav" | "flac" | "ogg" | "m4a" | "opus" | "ac3" | "aif" | "aiff" => {
                Some(MediaKind::Audio)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// File extension for a container/format name (`matroska` is written as `mkv`).
pub fn actual_extension(format: &str) -> String {
    let format = format.trim().trim_start_matches('.').to_lowercase();
    match format.as_str() {
        "matroska" => "mkv".to_string(),
        _ => format,
    }
}

/// MIME type for a format, if known.
pub fn mime_type(format: &str) -> Option<&'static str> {
    let mime = match actual_extension(format).as_str() {
        "png" => "image/png",
        "jpeg" | "jpg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "ts" | "mts" => "video/mp2ts",
        "ogv" => "video/ogg",
        "mpeg" => "video/mpeg",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "wav" => "audio/x-wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "opus" => "audio/opus",
        "ac3" => "audio/ac3",
        "aif" | "aiff" => "audio/aiff",
        _ => return None,
    };
    Some(mime)
}
