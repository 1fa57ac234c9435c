//! Dashboard statistics and health check

use reqwest::Method;

use facefolio_protocol::api::{HealthResponse, Stats};
use facefolio_protocol::common::{Image, Person};

use crate::client::{ApiClient, ApiResponse};
use crate::error::{FolioError, Result};

pub struct StatsService<'a, C: ApiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ApiClient + ?Sized> StatsService<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn dashboard(&self) -> Result<Stats> {
        let response: ApiResponse<Stats> = self
            .client
            .request(Method::GET, "/stats", &[], None::<&()>)
            .await?;
        response.into_data("stats")
    }

    /// Most recent uploads
    pub async fn recent(&self) -> Result<Vec<Image>> {
        self.list("/stats/recent").await
    }

    /// A preview of images with faces nobody has been assigned to
    pub async fn unidentified(&self) -> Result<Vec<Image>> {
        self.list("/stats/unidentified").await
    }

    /// People with the most images
    pub async fn people_summary(&self) -> Result<Vec<Person>> {
        self.list("/stats/people-summary").await
    }

    /// Check the backend is up
    ///
    /// `/health` answers with a bare `{status, message}` body.
    pub async fn health(&self) -> Result<HealthResponse> {
        let response: ApiResponse<serde_json::Value> = self
            .client
            .request(Method::GET, "/health", &[], None::<&()>)
            .await?;

        let status: Option<String> = response.extra_field("status")?;
        match status {
            Some(status) => Ok(HealthResponse {
                status,
                message: response.message,
            }),
            None => Err(FolioError::invalid_response(
                200,
                "Health response has no status",
            )),
        }
    }

    async fn list<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let response: ApiResponse<Vec<T>> = self
            .client
            .request(Method::GET, endpoint, &[], None::<&()>)
            .await?;
        Ok(response.data.unwrap_or_default())
    }
}
