use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::config::{AttachmentStrategy, ChatConfig};
use crate::error::{AppError, ErrorKind};
use crate::model::Attachment;
use crate::IMAGE_FOLDER;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("image is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: usize },

    #[error("encoded image is {len} characters, limit is {max}")]
    EncodedTooLarge { len: usize, max: usize },

    #[error("image payload is empty")]
    Empty,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("image upload requires a connection")]
    NeedsConnection,

    #[error("invalid download url: {0}")]
    InvalidUrl(String),
}

impl From<AttachmentError> for AppError {
    fn from(e: AttachmentError) -> Self {
        let kind = match &e {
            AttachmentError::TooLarge { .. } => ErrorKind::AttachmentTooLarge,
            AttachmentError::EncodedTooLarge { .. } => ErrorKind::AttachmentEncodedTooLarge,
            AttachmentError::NeedsConnection => ErrorKind::AttachmentNeedsConnection,
            AttachmentError::Empty
            | AttachmentError::UnsupportedFormat
            | AttachmentError::InvalidUrl(_) => ErrorKind::AttachmentProcessing,
        };
        let message = match &e {
            AttachmentError::TooLarge { max, .. } => format!(
                "Images can be at most {}. Please pick a smaller image.",
                format_limit(*max)
            ),
            _ => "Failed to process image. Please try another one.".to_string(),
        };
        AppError::new(kind, message).with_internal(e.to_string())
    }
}

/// Byte limits as shown to the user: whole megabytes when exact, else kilobytes.
fn format_limit(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} KB", bytes.div_ceil(KB))
    }
}

/// A picked image that passed the size check and waits for the next send.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedAttachment {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl fmt::Debug for StagedAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedAttachment")
            .field("format", &self.format)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl StagedAttachment {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            _ => "image/jpeg",
        }
    }

    fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
            _ => "jpg",
        }
    }
}

/// Accepts picked image bytes. `reported_size` is the picker's file size,
/// checked before the bytes themselves.
pub fn stage(
    bytes: Vec<u8>,
    reported_size: Option<u64>,
    config: &ChatConfig,
) -> Result<StagedAttachment, AttachmentError> {
    let size = reported_size.unwrap_or(bytes.len() as u64).max(bytes.len() as u64);
    if size > config.max_attachment_bytes as u64 {
        return Err(AttachmentError::TooLarge {
            size,
            max: config.max_attachment_bytes,
        });
    }
    if bytes.is_empty() {
        return Err(AttachmentError::Empty);
    }

    let format = image::guess_format(&bytes).map_err(|_| AttachmentError::UnsupportedFormat)?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif
    ) {
        return Err(AttachmentError::UnsupportedFormat);
    }

    Ok(StagedAttachment { bytes, format })
}

pub fn encode_inline(
    staged: &StagedAttachment,
    max_len: usize,
) -> Result<Attachment, AttachmentError> {
    let payload = general_purpose::STANDARD.encode(&staged.bytes);
    let data_url = format!("data:{};base64,{payload}", staged.content_type());
    if data_url.len() > max_len {
        return Err(AttachmentError::EncodedTooLarge {
            len: data_url.len(),
            max: max_len,
        });
    }
    Ok(Attachment::Inline { data_url })
}

/// Object path derived from the image content, so retried uploads of the same
/// picture land next to each other.
#[must_use]
pub fn upload_path(staged: &StagedAttachment, now_ms: i64) -> String {
    let hash = blake3::hash(&staged.bytes);
    format!(
        "{IMAGE_FOLDER}/{}_{now_ms}.{}",
        &hash.to_hex()[..16],
        staged.extension()
    )
}

pub fn remote(download_url: &str) -> Result<Attachment, AttachmentError> {
    let url = Url::parse(download_url).map_err(|e| AttachmentError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "https" | "http" => Ok(Attachment::Remote { url: url.into() }),
        other => Err(AttachmentError::InvalidUrl(format!("scheme {other}"))),
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum AttachmentPlan {
    Ready(Attachment),
    Upload {
        path: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl fmt::Debug for AttachmentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready"),
            Self::Upload { path, .. } => f.debug_struct("Upload").field("path", path).finish(),
        }
    }
}

/// Decides how the staged image goes out. Every size check happens here,
/// before any upload request exists.
pub fn plan(
    staged: &StagedAttachment,
    online: bool,
    config: &ChatConfig,
    now_ms: i64,
) -> Result<AttachmentPlan, AttachmentError> {
    if staged.len() > config.max_attachment_bytes {
        return Err(AttachmentError::TooLarge {
            size: staged.len() as u64,
            max: config.max_attachment_bytes,
        });
    }

    let upload = || {
        if !online {
            return Err(AttachmentError::NeedsConnection);
        }
        Ok(AttachmentPlan::Upload {
            path: upload_path(staged, now_ms),
            content_type: staged.content_type().to_string(),
            bytes: staged.bytes.clone(),
        })
    };

    match config.attachment_strategy {
        AttachmentStrategy::Inline => {
            encode_inline(staged, config.max_inline_encoded_len).map(AttachmentPlan::Ready)
        }
        AttachmentStrategy::Upload => upload(),
        AttachmentStrategy::Hybrid => {
            match encode_inline(staged, config.max_inline_encoded_len) {
                Ok(attachment) => Ok(AttachmentPlan::Ready(attachment)),
                Err(AttachmentError::EncodedTooLarge { .. }) if online => upload(),
                Err(e) => Err(e),
            }
        }
    }
}

/// An upload in flight plus the text that goes out with it. The staged image
/// is kept so a failed upload can hand it back to the composer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpload {
    pub path: String,
    pub text: Option<String>,
    pub staged: StagedAttachment,
}
