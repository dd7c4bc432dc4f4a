// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage for handwritten-signature images.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Largest accepted image.
pub const MAX_ARTIFACT_BYTES: usize = 1024 * 1024;

/// Where an artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub url: String,
    /// Hex SHA-256 of the stored bytes
    pub content_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("artifact is empty")]
    Empty,

    #[error("artifact exceeds {MAX_ARTIFACT_BYTES} bytes")]
    TooLarge,

    #[error("artifact bytes are not a {0} image")]
    ContentMismatch(&'static str),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    /// Whether the caller supplied an unacceptable artifact.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ArtifactError::Io(_))
    }
}

/// Binary artifact store (save bytes, return URL and content hash).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, bytes: &[u8], content_type: &str)
        -> Result<StoredArtifact, ArtifactError>;
}

/// Check type, size and magic bytes; returns the file extension.
pub fn validate_image(bytes: &[u8], content_type: &str) -> Result<&'static str, ArtifactError> {
    let (ext, magic_ok) = match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => ("png", bytes.starts_with(b"\x89PNG\r\n\x1a\n")),
        "image/jpeg" | "image/jpg" => ("jpg", bytes.starts_with(&[0xff, 0xd8, 0xff])),
        "image/webp" => (
            "webp",
            bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
        ),
        other => return Err(ArtifactError::UnsupportedContentType(other.to_string())),
    };

    if bytes.is_empty() {
        return Err(ArtifactError::Empty);
    }
    if bytes.len() > MAX_ARTIFACT_BYTES {
        return Err(ArtifactError::TooLarge);
    }
    if !magic_ok {
        return Err(ArtifactError::ContentMismatch(ext));
    }
    Ok(ext)
}

/// Content-addressed files under `{root}/<sha256>.<ext>`.
pub struct FsArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, ArtifactError> {
        let ext = validate_image(bytes, content_type)?;
        let content_hash = alloy::hex::encode(Sha256::digest(bytes));
        let file_name = format!("{}.{}", content_hash, ext);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        tracing::debug!(content_hash = %content_hash, size = bytes.len(), "Stored signature artifact");

        Ok(StoredArtifact {
            url: format!("{}/{}", self.public_base_url.trim_end_matches('/'), file_name),
            content_hash,
        })
    }
}

#[cfg(test)]
pub(crate) const TINY_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
