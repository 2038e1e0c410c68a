/// Blob storage collaborator (avatars and product images).
///
/// The backend never stores image bytes itself; it passes them through to an
/// external storage service and keeps only the returned URL and blob id.

use serde::Deserialize;

use crate::error::AppError;

/// Server-side transform applied by the storage service on upload
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub width: u32,
    pub height: u32,
    pub crop: &'static str,
}

/// 300x300 face-gravity thumbnail used for avatars
pub const AVATAR_TRANSFORM: Transform = Transform {
    width: 300,
    height: 300,
    crop: "thumb",
};

/// 1280x720 fill used for product images
pub const PRODUCT_TRANSFORM: Transform = Transform {
    width: 1280,
    height: 720,
    crop: "fill",
};

/// What the storage service hands back for an uploaded blob
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedBlob {
    pub url: String,
    pub id: String,
}

#[derive(Clone)]
pub struct BlobClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BlobClient {
    pub fn new(base_url: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    /// Upload image bytes, returning the stored blob's URL and id
    ///
    /// # Errors
    /// Returns error if the storage service rejects the upload
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        transform: Transform,
    ) -> Result<UploadedBlob, AppError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("upload")
            .mime_str(content_type)
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("width", transform.width.to_string())
            .text("height", transform.height.to_string())
            .text("crop", transform.crop);

        let url = format!("{}/upload", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Blob upload failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("Blob service error: {}", e)))?;

        response
            .json::<UploadedBlob>()
            .await
            .map_err(|e| AppError::Internal(format!("Blob service response malformed: {}", e)))
    }

    /// Delete a stored blob by id
    ///
    /// # Errors
    /// Returns error if the storage service rejects the deletion
    pub async fn destroy(&self, blob_id: &str) -> Result<(), AppError> {
        let url = format!("{}/files/{}", self.base_url, blob_id);

        self.http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Blob delete failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Internal(format!("Blob service error: {}", e)))?;

        Ok(())
    }
}
