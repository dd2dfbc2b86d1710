use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::Category;

pub struct CategoryService<'a> {
    client: &'a ApiClient,
}

impl<'a> CategoryService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Categories are public, so the call goes out without a token.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn list(&self) -> Result<Vec<Category>, ApiError> {
        self.client.execute(RequestSpec::get("/api/categories").anonymous()).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Category, ApiError> {
        let spec = RequestSpec::post("/api/categories")
            .json(&serde_json::json!({ "name": name, "description": description }))?;
        self.client.execute(spec).await
    }
}
