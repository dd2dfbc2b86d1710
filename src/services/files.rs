//! File uploads.
//!
//! The multipart form is kept as owned bytes on the request descriptor, so an
//! upload interrupted by an expired token is replayed in full after refresh.

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::{MultipartForm, RequestSpec};

use super::types::UploadedFile;

pub struct FileService<'a> {
    client: &'a ApiClient,
}

impl<'a> FileService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// [`ApiError::Api`] for rejected types or sizes.
    pub async fn upload(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Result<UploadedFile, ApiError> {
        let form = MultipartForm::new().file("file", file_name, content_type, bytes);
        self.client.execute(RequestSpec::post("/api/files/upload").multipart(form)).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn delete(&self, file_id: &str) -> Result<(), ApiError> {
        self.client.execute_discard(RequestSpec::delete(format!("/api/files/{file_id}"))).await
    }
}

#[cfg(test)]
#[path = "files_test.rs"]
mod tests;
