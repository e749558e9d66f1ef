//! Persistence of client-cropped images submitted as data URLs.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use thiserror::Error;
use tracing::info;

use crate::infra::telemetry::IMAGES_SAVED_TOTAL;
use crate::infra::uploads::{StoredUpload, UploadStorage, UploadStorageError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("image payload has no `,` separator")]
    MissingSeparator,
    #[error("image payload is not valid base64")]
    InvalidBase64,
    #[error("image payload is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Malformed(#[from] DataUrlError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

/// Bytes decoded from a data URL together with the file extension implied by
/// its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub data: Vec<u8>,
}

/// Decodes `data:<media>;base64,<payload>`. Everything up to the first comma is
/// treated as the header; the remainder must be standard base64.
pub fn decode_data_url(input: &str) -> Result<DecodedImage, DataUrlError> {
    let (header, payload) = input
        .split_once(',')
        .ok_or(DataUrlError::MissingSeparator)?;

    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(DataUrlError::Empty);
    }

    let data = STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| DataUrlError::InvalidBase64)?;
    if data.is_empty() {
        return Err(DataUrlError::Empty);
    }

    Ok(DecodedImage {
        extension: extension_for(header),
        data,
    })
}

fn extension_for(header: &str) -> &'static str {
    let media_type = header
        .trim()
        .strip_prefix("data:")
        .unwrap_or(header)
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

#[derive(Clone)]
pub struct ImageService {
    storage: Arc<UploadStorage>,
}

impl ImageService {
    pub fn new(storage: Arc<UploadStorage>) -> Self {
        Self { storage }
    }

    /// Decodes and stores a cropped image under a fresh unique name.
    pub async fn save_cropped(&self, data_url: &str) -> Result<StoredUpload, ImageError> {
        let decoded = decode_data_url(data_url)?;
        let stored = self
            .storage
            .store_image(decoded.extension, Bytes::from(decoded.data))
            .await?;

        metrics::counter!(IMAGES_SAVED_TOTAL).increment(1);
        info!(
            target = "newsdesk::images",
            stored_path = %stored.stored_path,
            size_bytes = stored.size_bytes,
            "cropped image saved"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_url() {
        let decoded = decode_data_url("data:image/png;base64,aGVsbG8=").expect("decode");

        assert_eq!(decoded.data, b"hello");
        assert_eq!(decoded.extension, "png");
    }

    #[test]
    fn jpeg_media_type_maps_to_jpg() {
        let decoded = decode_data_url("data:image/jpeg;base64,aGk=").expect("decode");
        assert_eq!(decoded.extension, "jpg");
    }

    #[test]
    fn unknown_header_defaults_to_png() {
        let decoded = decode_data_url("whatever,aGk=").expect("decode");
        assert_eq!(decoded.extension, "png");
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert_eq!(
            decode_data_url("aGVsbG8="),
            Err(DataUrlError::MissingSeparator)
        );
        assert_eq!(
            decode_data_url("data:image/png;base64,***"),
            Err(DataUrlError::InvalidBase64)
        );
        assert_eq!(
            decode_data_url("data:image/png;base64,"),
            Err(DataUrlError::Empty)
        );
    }

    #[tokio::test]
    async fn saved_image_holds_decoded_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Arc::new(UploadStorage::new(dir.path().to_path_buf()).expect("storage"));
        let service = ImageService::new(storage.clone());

        let stored = service
            .save_cropped("data:image/png;base64,aGVsbG8=")
            .await
            .expect("save");

        assert_eq!(
            storage.read(&stored.stored_path).await.expect("read"),
            Bytes::from_static(b"hello")
        );
    }
}
