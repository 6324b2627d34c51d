//! Object Storage Abstractions
//!
//! Contracts for the blob store holding uploaded originals and their enhanced
//! derivatives, together with the key and URL conventions every adapter shares.
//!
//! Objects are addressed by their logical filename. The physical key is derived
//! deterministically: derivatives (names starting with [`DERIVATIVE_PREFIX`])
//! live under `enhanced/`, everything else under `originals/`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Prefix prepended to an original filename to name its enhanced derivative.
pub const DERIVATIVE_PREFIX: &str = "enhanced_";

/// Content type of every derivative written by the pipeline.
pub const DERIVATIVE_CONTENT_TYPE: &str = "image/jpeg";

/// Which half of the bucket an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Original,
    Enhanced,
}

impl AssetKind {
    /// Classify a logical filename by its prefix.
    pub fn of(filename: &str) -> Self {
        if filename.starts_with(DERIVATIVE_PREFIX) {
            AssetKind::Enhanced
        } else {
            AssetKind::Original
        }
    }

    /// Top-level directory holding assets of this kind.
    pub fn directory(self) -> &'static str {
        match self {
            AssetKind::Original => "originals",
            AssetKind::Enhanced => "enhanced",
        }
    }
}

/// Name of the enhanced derivative of `filename`.
pub fn derivative_name(filename: &str) -> String {
    format!("{DERIVATIVE_PREFIX}{filename}")
}

/// Physical object key for a logical filename.
pub fn object_key(filename: &str) -> String {
    format!("{}/{}", AssetKind::of(filename).directory(), filename)
}

/// Public CDN URL for a logical filename served from `domain`.
pub fn public_url(domain: &str, filename: &str) -> String {
    format!("https://{}/{}", domain.trim_end_matches('/'), object_key(filename))
}

/// HTTP method a pre-signed URL is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignMethod {
    Get,
    Put,
}

/// Request handed to a [`UrlSigner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub method: SignMethod,
    /// Physical object key (see [`object_key`])
    pub key: String,
    /// Content type the upload must carry (PUT only)
    pub content_type: Option<String>,
    pub expires_in: Duration,
}

impl SignRequest {
    pub fn get(key: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            method: SignMethod::Get,
            key: key.into(),
            content_type: None,
            expires_in,
        }
    }

    pub fn put(key: impl Into<String>, content_type: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            method: SignMethod::Put,
            key: key.into(),
            content_type: Some(content_type.into()),
            expires_in,
        }
    }
}

/// Time-limited direct-access URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl PresignedUrl {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Mints pre-signed URLs for the object store.
///
/// Credential handling stays with the host: the core only ever sees the signed
/// URL, never the keys used to produce it.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, request: SignRequest) -> Result<PresignedUrl>;
}

/// Object storage trait
///
/// Holds uploaded originals and the derivatives produced by the pipeline.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{derivative_name, ObjectStorage, DERIVATIVE_CONTENT_TYPE};
///
/// async fn copy_as_derivative(storage: &dyn ObjectStorage, filename: &str) -> Result<()> {
///     let bytes = storage.fetch(filename).await?;
///     storage
///         .put_derivative(&derivative_name(filename), bytes, DERIVATIVE_CONTENT_TYPE)
///         .await
/// }
/// ```
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Read the full contents of an object
    ///
    /// Returns `BridgeError::NotFound` when the object does not exist.
    async fn fetch(&self, filename: &str) -> Result<Bytes>;

    /// Write a derivative object, replacing any previous version
    async fn put_derivative(&self, filename: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Mint a URL a browser can PUT an upload to directly
    async fn presign_upload(&self, filename: &str, content_type: &str) -> Result<PresignedUrl>;

    /// Stable public URL of an object
    fn public_url(&self, filename: &str) -> String;

    /// Public URL that asks the CDN to serve the object as an attachment
    fn download_url(&self, filename: &str) -> String {
        let disposition = format!("attachment; filename={filename}");
        format!(
            "{}?response-content-disposition={}",
            self.public_url(filename),
            urlencoding::encode(&disposition)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_from_prefix() {
        assert_eq!(AssetKind::of("cat.jpg"), AssetKind::Original);
        assert_eq!(AssetKind::of("enhanced_cat.jpg"), AssetKind::Enhanced);
        assert_eq!(AssetKind::of("my_enhanced_cat.jpg"), AssetKind::Original);
    }

    #[test]
    fn test_object_keys() {
        assert_eq!(object_key("cat.jpg"), "originals/cat.jpg");
        assert_eq!(object_key(&derivative_name("cat.jpg")), "enhanced/enhanced_cat.jpg");
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("cdn.example.net/", "cat.jpg"),
            "https://cdn.example.net/originals/cat.jpg"
        );
    }

    struct FixedDomain;

    #[async_trait]
    impl ObjectStorage for FixedDomain {
        async fn fetch(&self, filename: &str) -> Result<Bytes> {
            Err(crate::BridgeError::NotFound(filename.to_string()))
        }

        async fn put_derivative(&self, _filename: &str, _data: Bytes, _content_type: &str) -> Result<()> {
            Ok(())
        }

        async fn presign_upload(&self, _filename: &str, _content_type: &str) -> Result<PresignedUrl> {
            Err(crate::BridgeError::OperationFailed("unsigned".to_string()))
        }

        fn public_url(&self, filename: &str) -> String {
            public_url("cdn.example.net", filename)
        }
    }

    #[test]
    fn test_download_url_requests_attachment() {
        let url = FixedDomain.download_url("my cat.jpg");
        assert_eq!(
            url,
            "https://cdn.example.net/originals/my cat.jpg\
             ?response-content-disposition=attachment%3B%20filename%3Dmy%20cat.jpg"
        );
    }

    #[test]
    fn test_presigned_expiry() {
        let now = Utc::now();
        let url = PresignedUrl {
            url: "https://example".to_string(),
            expires_at: now,
        };
        assert!(url.is_expired(now));
        assert!(!url.is_expired(now - chrono::Duration::seconds(1)));
    }
}
