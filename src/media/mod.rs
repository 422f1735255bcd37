//! Media intake validation
//!
//! Classifies inbound attachments into a closed set of media kinds and
//! applies the submission policy (type, size, duration ceilings). The
//! descriptor type is deliberately decoupled from Telegram's message shape;
//! [`classify_message`] is the only adapter.

use crate::config::{MAX_IMAGE_DOC_BYTES, MAX_VIDEO_BYTES, MAX_VIDEO_DURATION_SECS};
use std::path::{Path, PathBuf};
use teloxide::types::Message;
use thiserror::Error;

pub mod probe;

/// Closed classification of an inbound attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Compressed photo
    Image,
    /// Uncompressed image sent as a document
    ImageDocument,
    /// Compressed video
    Video,
    /// Video sent as a document
    VideoDocument,
    /// Anything else, including plain text
    Unrecognized,
}

impl MediaKind {
    /// Canonical file extension for artifacts of this kind
    #[must_use]
    pub const fn canonical_extension(self) -> &'static str {
        match self {
            Self::Image | Self::ImageDocument => "jpg",
            Self::Video | Self::VideoDocument => "mp4",
            Self::Unrecognized => "bin",
        }
    }

    /// Whether the duration ceiling applies to this kind
    #[must_use]
    pub const fn is_video(self) -> bool {
        matches!(self, Self::Video | Self::VideoDocument)
    }
}

/// Platform-independent descriptor of an inbound attachment
#[derive(Debug, Clone)]
pub struct AttachmentMeta {
    /// Classified media kind
    pub kind: MediaKind,
    /// Byte size declared by the platform
    pub byte_size: u64,
    /// Platform handle used to download the artifact
    pub file_id: String,
    /// Platform-unique content identifier, stable across re-sends
    pub unique_id: String,
}

/// Validation rejections. The `Display` text is the user-facing message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// First input is neither a photo nor an image document
    #[error("Please send a photo or an uncompressed image file.")]
    UnsupportedFirstInput,
    /// Second input is not a supported media class
    #[error("Received unknown file from you. Please provide correct data")]
    UnsupportedSecondInput,
    /// Image document over the configured ceiling
    #[error("The image file is too large. Please send an image up to 5 MB.")]
    ImageDocumentTooLarge,
    /// Video over the configured size ceiling
    #[error("The video is too large. Please send a video up to 200 MB.")]
    VideoTooLarge,
    /// Video over the configured duration ceiling
    #[error("The video is too long. Please send a video up to 15 seconds.")]
    VideoTooLong,
}

impl IntakeError {
    /// Second-stage rejections on an unsupported type end the submission;
    /// every other rejection re-prompts for the same input.
    #[must_use]
    pub const fn aborts_session(&self) -> bool {
        matches!(self, Self::UnsupportedSecondInput)
    }
}

/// Build an [`AttachmentMeta`] from a Telegram message.
///
/// Compressed photos arrive as a size ladder; the largest rendition is the
/// one downloaded, so it is the one described here.
#[must_use]
pub fn classify_message(msg: &Message) -> AttachmentMeta {
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return AttachmentMeta {
            kind: MediaKind::Image,
            byte_size: u64::from(photo.file.size),
            file_id: photo.file.id.0.clone(),
            unique_id: photo.file.unique_id.0.clone(),
        };
    }

    if let Some(video) = msg.video() {
        return AttachmentMeta {
            kind: MediaKind::Video,
            byte_size: u64::from(video.file.size),
            file_id: video.file.id.0.clone(),
            unique_id: video.file.unique_id.0.clone(),
        };
    }

    if let Some(doc) = msg.document() {
        let kind = match doc.mime_type.as_ref().map(|m| m.type_().as_str()) {
            Some("image") => MediaKind::ImageDocument,
            Some("video") => MediaKind::VideoDocument,
            _ => MediaKind::Unrecognized,
        };
        return AttachmentMeta {
            kind,
            byte_size: u64::from(doc.file.size),
            file_id: doc.file.id.0.clone(),
            unique_id: doc.file.unique_id.0.clone(),
        };
    }

    AttachmentMeta {
        kind: MediaKind::Unrecognized,
        byte_size: 0,
        file_id: String::new(),
        unique_id: String::new(),
    }
}

/// First-stage policy: the source face image.
///
/// # Errors
///
/// Returns the rejection to show to the user; the caller re-prompts.
pub fn check_first_input(meta: &AttachmentMeta) -> Result<(), IntakeError> {
    match meta.kind {
        MediaKind::Image => Ok(()),
        MediaKind::ImageDocument => {
            if meta.byte_size > MAX_IMAGE_DOC_BYTES {
                Err(IntakeError::ImageDocumentTooLarge)
            } else {
                Ok(())
            }
        }
        _ => Err(IntakeError::UnsupportedFirstInput),
    }
}

/// Second-stage policy on declared metadata: the target image or video.
///
/// Duration is not known at this point; callers check it with
/// [`check_video_duration`] after downloading and probing the artifact.
///
/// # Errors
///
/// Returns the rejection to show to the user. Unsupported types abort the
/// submission ([`IntakeError::aborts_session`]); the rest re-prompt.
pub fn check_second_input(meta: &AttachmentMeta) -> Result<(), IntakeError> {
    match meta.kind {
        MediaKind::Image => Ok(()),
        MediaKind::ImageDocument => {
            if meta.byte_size > MAX_IMAGE_DOC_BYTES {
                Err(IntakeError::ImageDocumentTooLarge)
            } else {
                Ok(())
            }
        }
        MediaKind::Video | MediaKind::VideoDocument => {
            if meta.byte_size > MAX_VIDEO_BYTES {
                Err(IntakeError::VideoTooLarge)
            } else {
                Ok(())
            }
        }
        MediaKind::Unrecognized => Err(IntakeError::UnsupportedSecondInput),
    }
}

/// Duration policy applied after the downloaded video has been probed.
///
/// # Errors
///
/// Returns [`IntakeError::VideoTooLong`] when over the ceiling.
pub fn check_video_duration(duration_secs: f64) -> Result<(), IntakeError> {
    if duration_secs > MAX_VIDEO_DURATION_SECS {
        Err(IntakeError::VideoTooLong)
    } else {
        Ok(())
    }
}

/// Destination path for an accepted artifact: the per-user working
/// directory plus the platform-unique id and the canonical extension.
#[must_use]
pub fn artifact_path(user_dir: &Path, meta: &AttachmentMeta) -> PathBuf {
    user_dir.join(format!(
        "{}.{}",
        meta.unique_id,
        meta.kind.canonical_extension()
    ))
}
