//! Image endpoints

use reqwest::Method;

use facefolio_protocol::api::{
    AssignImageRequest, Image, ImageFilter, ImageId, PersonId, ReprocessResponse,
    UploadFileResult, UploadResponse,
};

use crate::client::{ApiClient, ApiResponse, FilePayload};
use crate::collection::{PageRequest, PageResult};
use crate::error::{FolioError, Result};

/// Service for `/images`
pub struct ImageService<'a, C: ApiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ApiClient + ?Sized> ImageService<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// List one page of images
    ///
    /// A request without a filter is sent as `filter=all`, matching the server default.
    pub async fn list(&self, request: &PageRequest) -> Result<PageResult<Image>> {
        let mut query = request.query();
        if request.filter.is_none() {
            query.push(("filter", ImageFilter::All.as_str().to_string()));
        }

        let response: ApiResponse<Vec<Image>> = self
            .client
            .request(Method::GET, "/images", &query, None::<&()>)
            .await?;

        let pagination = response.pagination;
        let images = response.into_data("images")?;
        Ok(PageResult::from_meta(images, pagination, request))
    }

    pub async fn get(&self, image_id: &ImageId) -> Result<Image> {
        let response: ApiResponse<Image> = self
            .client
            .request(Method::GET, &image_endpoint(image_id), &[], None::<&()>)
            .await
            .map_err(|e| not_found_as_image(e, image_id))?;

        response.into_data("image")
    }

    /// Delete an image and its stored file
    ///
    /// Returns the server's confirmation message.
    pub async fn delete(&self, image_id: &ImageId) -> Result<String> {
        let response: ApiResponse<serde_json::Value> = self
            .client
            .request(Method::DELETE, &image_endpoint(image_id), &[], None::<&()>)
            .await
            .map_err(|e| not_found_as_image(e, image_id))?;

        Ok(response
            .message
            .unwrap_or_else(|| "Image deleted successfully".to_string()))
    }

    /// Assign an image to `person_id`, or unassign it with `None`
    ///
    /// # Returns
    ///
    /// The updated image when the server includes it.
    pub async fn assign(
        &self,
        image_id: &ImageId,
        person_id: Option<&PersonId>,
    ) -> Result<(Option<Image>, String)> {
        let payload = AssignImageRequest {
            person_id: person_id.cloned(),
        };
        let endpoint = format!("{}/assign", image_endpoint(image_id));

        let response: ApiResponse<Image> = self
            .client
            .request(Method::PATCH, &endpoint, &[], Some(&payload))
            .await
            .map_err(|e| not_found_as_image(e, image_id))?;

        let message = response.message.clone().unwrap_or_else(|| match person_id {
            Some(_) => "Image assigned successfully".to_string(),
            None => "Image unassigned successfully".to_string(),
        });
        Ok((response.data, message))
    }

    /// Run face detection and matching again
    pub async fn reprocess(&self, image_id: &ImageId) -> Result<ReprocessResponse> {
        let endpoint = format!("{}/reprocess", image_endpoint(image_id));
        let response: ApiResponse<serde_json::Value> = self
            .client
            .request(Method::POST, &endpoint, &[], None::<&()>)
            .await
            .map_err(|e| not_found_as_image(e, image_id))?;

        response.extras()
    }

    /// Upload one batch of files
    ///
    /// # Errors
    ///
    /// Fails as a whole when the request fails or the server rejects the batch
    /// (e.g. no files). Per-file problems are reported in the results instead.
    pub async fn upload(&self, files: Vec<FilePayload>) -> Result<Vec<UploadFileResult>> {
        if files.is_empty() {
            return Err(FolioError::invalid_input("No files to upload"));
        }

        let response: ApiResponse<serde_json::Value> =
            self.client.upload("/images/upload", files).await?;
        let upload: UploadResponse = response.extras()?;
        Ok(upload.results)
    }
}

fn image_endpoint(image_id: &ImageId) -> String {
    format!("/images/{}", image_id)
}

fn not_found_as_image(err: FolioError, image_id: &ImageId) -> FolioError {
    match err {
        FolioError::NotFound { .. } => FolioError::image_not_found(image_id.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::tests::utils::test_helpers::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_sends_filter_and_reads_pagination() {
        let client = mock_client();
        client.add_response(
            Method::GET,
            "/images",
            list_envelope(vec![image_json("a", None), image_json("b", None)], 2, 2, 5),
        );
        let service = ImageService::new(&client);

        let request = PageRequest::new(2)
            .with_page(2)
            .with_filter(ImageFilter::Unidentified);
        let page = service.list(&request).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);

        let sent = client.last_request(&Method::GET, "/images").unwrap();
        assert_eq!(sent.query_value("page"), Some("2"));
        assert_eq!(sent.query_value("per_page"), Some("2"));
        assert_eq!(sent.query_value("filter"), Some("unidentified"));
    }

    #[tokio::test]
    async fn test_list_defaults_to_all() {
        let client = mock_client();
        client.add_response(Method::GET, "/images", list_envelope(vec![], 1, 20, 0));
        let service = ImageService::new(&client);

        let page = service.list(&PageRequest::new(20)).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);

        let sent = client.last_request(&Method::GET, "/images").unwrap();
        assert_eq!(sent.query_value("filter"), Some("all"));
    }

    #[tokio::test]
    async fn test_get_maps_not_found() {
        let client = mock_client();
        client.add_error(
            Method::GET,
            "/images/missing",
            FolioError::not_found("Image not found"),
        );
        let service = ImageService::new(&client);

        let err = service.get(&ImageId::new("missing")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ImageNotFound);
    }

    #[tokio::test]
    async fn test_assign_sends_nullable_person() {
        let client = mock_client();
        client.add_response(
            Method::PATCH,
            "/images/a/assign",
            json!({"success": true, "data": image_json("a", None), "message": "Image unassigned successfully"}),
        );
        let service = ImageService::new(&client);

        let (image, message) = service.assign(&ImageId::new("a"), None).await.unwrap();
        assert!(!image.unwrap().is_identified);
        assert_eq!(message, "Image unassigned successfully");

        let sent = client.last_request(&Method::PATCH, "/images/a/assign").unwrap();
        assert_eq!(sent.body, Some(json!({"person_id": null})));
    }

    #[tokio::test]
    async fn test_reprocess_reads_top_level_fields() {
        let client = mock_client();
        client.add_response(
            Method::POST,
            "/images/a/reprocess",
            json!({"success": true, "message": "Image reprocessed", "faces_detected": 2, "matched_person": "p1"}),
        );
        let service = ImageService::new(&client);

        let result = service.reprocess(&ImageId::new("a")).await.unwrap();
        assert_eq!(result.faces_detected, 2);
        assert_eq!(result.matched_person, Some(PersonId::new("p1")));
    }

    #[tokio::test]
    async fn test_delete_surfaces_application_error() {
        let client = mock_client();
        client.add_response(
            Method::DELETE,
            "/images/a",
            json!({"success": false, "error": "Failed to delete image"}),
        );
        let service = ImageService::new(&client);

        let err = service.delete(&ImageId::new("a")).await.unwrap_err();
        assert!(err.is_application_error());
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_batch() {
        let client = mock_client();
        let service = ImageService::new(&client);
        assert!(service.upload(Vec::new()).await.is_err());
        assert!(client.requests().is_empty());
    }
}
