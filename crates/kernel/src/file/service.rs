//! Media uploads: classification, storage and metadata rows.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::storage::FileStorage;
use crate::metrics::Metrics;
use crate::models::{Media, NewMedia};
use crate::tenant::TenantContext;

/// Largest accepted upload (50 MB).
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Folder used when the client names none.
pub const DEFAULT_FOLDER: &str = "uploads";

/// Document types accepted besides images, video and audio.
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
];

/// Extensions recognised when the content cannot be sniffed.
const EXTENSION_MIME_TYPES: &[(&str, &str)] = &[
    ("svg", "image/svg+xml"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("xls", "application/vnd.ms-excel"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

/// Broad media kind stored with each upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
        }
    }

    /// Kind of a MIME type, or `None` when uploads of it are refused.
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(MediaType::Image)
        } else if mime.starts_with("video/") {
            Some(MediaType::Video)
        } else if mime.starts_with("audio/") {
            Some(MediaType::Audio)
        } else if DOCUMENT_MIME_TYPES.contains(&mime) {
            Some(MediaType::Document)
        } else {
            None
        }
    }
}

/// Why an upload was refused.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,

    #[error("file too large: {size} bytes (max {MAX_FILE_SIZE})")]
    TooLarge { size: usize },

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("invalid folder name")]
    InvalidFolder,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Sniff the MIME type of `data`, falling back to the file extension.
pub fn classify(data: &[u8], filename: &str) -> Result<(String, MediaType), UploadError> {
    let mime = match infer::get(data) {
        Some(kind) => kind.mime_type().to_string(),
        None => {
            let ext = Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            EXTENSION_MIME_TYPES
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| (*mime).to_string())
                .ok_or_else(|| UploadError::UnsupportedType(format!(".{ext}")))?
        }
    };

    let media_type =
        MediaType::from_mime(&mime).ok_or_else(|| UploadError::UnsupportedType(mime.clone()))?;
    Ok((mime, media_type))
}

/// Keep only safe file name characters, without any directory part.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect();

    if cleaned.trim_matches(['.', '_']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Normalize a client folder name: lowercase `[a-z0-9_-]` segments joined
/// by `/`. Blank means [`DEFAULT_FOLDER`].
pub fn normalize_folder(folder: Option<&str>) -> Result<String, UploadError> {
    let Some(folder) = folder.map(str::trim).filter(|f| !f.is_empty()) else {
        return Ok(DEFAULT_FOLDER.to_string());
    };

    let segments: Vec<String> = folder
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    let valid = !segments.is_empty()
        && segments.len() <= 4
        && segments.iter().all(|s| {
            s.len() <= 64
                && s
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        });
    if !valid {
        return Err(UploadError::InvalidFolder);
    }
    Ok(segments.join("/"))
}

/// One file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub data: Vec<u8>,
    pub folder: Option<String>,
    pub alt_text: Option<String>,
}

/// Stores uploads and keeps their metadata rows in step.
#[derive(Clone)]
pub struct MediaService {
    pool: PgPool,
    storage: Arc<dyn FileStorage>,
    metrics: Arc<Metrics>,
}

impl MediaService {
    pub fn new(pool: PgPool, storage: Arc<dyn FileStorage>, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            storage,
            metrics,
        }
    }

    /// Validate, store under `<tenant_id>/<folder>/` and record an upload.
    pub async fn upload(&self, tenant: &TenantContext, upload: Upload) -> Result<Media, UploadError> {
        let size = upload.data.len();
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > MAX_FILE_SIZE {
            return Err(UploadError::TooLarge { size });
        }

        let (mime_type, media_type) = classify(&upload.data, &upload.original_name)?;
        let folder = normalize_folder(upload.folder.as_deref())?;

        let unique = Uuid::now_v7().simple().to_string();
        let filename = format!(
            "{}_{}",
            &unique[unique.len() - 12..],
            sanitize_filename(&upload.original_name)
        );
        let path = format!("{}/{folder}/{filename}", tenant.id);

        self.storage
            .write(&path, &upload.data)
            .await
            .context("failed to store upload")?;

        let row = NewMedia {
            filename,
            original_name: upload.original_name,
            url: self.storage.public_url(&path),
            path: path.clone(),
            mime_type,
            media_type: media_type.as_str().to_string(),
            size: i64::try_from(size).context("upload size overflow")?,
            folder,
            alt_text: upload.alt_text,
        };

        let media = match Media::create(&self.pool, tenant, row).await {
            Ok(media) => media,
            Err(e) => {
                // Do not leave an orphaned file behind
                if let Err(cleanup) = self.storage.delete(&path).await {
                    warn!(error = %cleanup, path = %path, "failed to remove orphaned upload");
                }
                return Err(e.into());
            }
        };

        self.metrics.record_upload(size as u64);
        info!(
            tenant_id = tenant.id,
            media_id = media.id,
            media_type = %media.media_type,
            size,
            "media uploaded"
        );
        Ok(media)
    }

    /// Delete the row, then the file. A file that cannot be removed is
    /// logged and left behind.
    pub async fn delete(&self, media: &Media) -> anyhow::Result<bool> {
        let deleted = Media::delete(&self.pool, media).await?;
        if deleted && let Err(e) = self.storage.delete(&media.path).await {
            warn!(error = %e, path = %media.path, "failed to delete media file");
        }
        Ok(deleted)
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn sniffed_types_win_over_extensions() {
        let (mime, kind) = classify(PNG_HEADER, "photo.txt").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(kind, MediaType::Image);
    }

    #[test]
    fn extension_fallback_for_text_formats() {
        let (mime, kind) = classify(b"<svg xmlns='http://www.w3.org/2000/svg'/>", "Logo.SVG").unwrap();
        assert_eq!(mime, "image/svg+xml");
        assert_eq!(kind, MediaType::Image);

        let (_, kind) = classify(b"a,b\n1,2\n", "data.csv").unwrap();
        assert_eq!(kind, MediaType::Document);
    }

    #[test]
    fn unknown_types_are_refused() {
        assert!(matches!(
            classify(b"#!/bin/sh\necho hi", "run.sh"),
            Err(UploadError::UnsupportedType(_))
        ));
        // Sniffed but not allowed
        let zip = [b'P', b'K', 0x03, 0x04, 0, 0, 0, 0];
        assert!(classify(&zip, "bundle.zip").is_err());
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_filename("..."), "file");
    }

    #[test]
    fn folders_are_normalized() {
        assert_eq!(normalize_folder(None).unwrap(), DEFAULT_FOLDER);
        assert_eq!(normalize_folder(Some("  ")).unwrap(), DEFAULT_FOLDER);
        assert_eq!(normalize_folder(Some("Logos/2024")).unwrap(), "logos/2024");
        assert!(normalize_folder(Some("../secret")).is_err());
        assert!(normalize_folder(Some("a b")).is_err());
    }

    #[test]
    fn media_kinds_from_mime() {
        assert_eq!(MediaType::from_mime("video/mp4"), Some(MediaType::Video));
        assert_eq!(MediaType::from_mime("audio/mpeg"), Some(MediaType::Audio));
        assert_eq!(MediaType::from_mime("application/pdf"), Some(MediaType::Document));
        assert_eq!(MediaType::from_mime("application/zip"), None);
    }
}
