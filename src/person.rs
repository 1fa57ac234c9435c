//! People endpoints

use reqwest::Method;
use validator::Validate;

use facefolio_protocol::api::{
    CreatePersonRequest, Person, PersonId, PersonSort, SortOrder, UpdatePersonRequest,
};
use facefolio_protocol::common::Image;

use crate::client::{ApiClient, ApiResponse};
use crate::collection::{PageRequest, PageResult};
use crate::error::{FolioError, Result};

/// Service for `/people`
pub struct PersonService<'a, C: ApiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ApiClient + ?Sized> PersonService<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// All people matching `search`, in the requested order
    pub async fn list(
        &self,
        search: Option<&str>,
        sort: PersonSort,
        order: SortOrder,
    ) -> Result<Vec<Person>> {
        let mut query = vec![
            ("sort", sort.as_str().to_string()),
            ("order", order.as_str().to_string()),
        ];
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query.push(("search", term.to_string()));
        }

        let response: ApiResponse<Vec<Person>> = self
            .client
            .request(Method::GET, "/people", &query, None::<&()>)
            .await?;

        response.into_data("people")
    }

    /// One page of people
    ///
    /// The endpoint returns the whole list, so the page is sliced locally. If a
    /// future server version paginates, its metadata is used instead.
    pub async fn page(
        &self,
        request: &PageRequest,
        sort: PersonSort,
        order: SortOrder,
    ) -> Result<PageResult<Person>> {
        let mut query = request.query();
        query.push(("sort", sort.as_str().to_string()));
        query.push(("order", order.as_str().to_string()));

        let response: ApiResponse<Vec<Person>> = self
            .client
            .request(Method::GET, "/people", &query, None::<&()>)
            .await?;

        match response.pagination {
            Some(meta) => {
                let people = response.into_data("people")?;
                Ok(PageResult::from_meta(people, Some(meta), request))
            }
            None => {
                let people = response.into_data("people")?;
                Ok(PageResult::paginate(people, request))
            }
        }
    }

    pub async fn get(&self, person_id: &PersonId) -> Result<Person> {
        let response: ApiResponse<Person> = self
            .client
            .request(Method::GET, &person_endpoint(person_id), &[], None::<&()>)
            .await
            .map_err(|e| not_found_as_person(e, person_id))?;

        response.into_data("person")
    }

    /// Create a person
    ///
    /// The name is trimmed and must be 1 to 255 characters. The server rejects
    /// names that already exist (case-insensitive).
    pub async fn create(&self, name: &str) -> Result<Person> {
        let payload = CreatePersonRequest {
            name: name.trim().to_string(),
        };
        payload
            .validate()
            .map_err(|_| FolioError::validation_field("Name must be 1-255 characters", "name"))?;

        let response: ApiResponse<Person> = self
            .client
            .request(Method::POST, "/people", &[], Some(&payload))
            .await?;

        response.into_data("person")
    }

    pub async fn rename(&self, person_id: &PersonId, name: &str) -> Result<Person> {
        let payload = UpdatePersonRequest {
            name: Some(name.trim().to_string()),
        };
        payload
            .validate()
            .map_err(|_| FolioError::validation_field("Name must be 1-255 characters", "name"))?;

        let response: ApiResponse<Person> = self
            .client
            .request(Method::PUT, &person_endpoint(person_id), &[], Some(&payload))
            .await
            .map_err(|e| not_found_as_person(e, person_id))?;

        response.into_data("person")
    }

    /// Delete a person; their images are unassigned, or deleted with `delete_images`
    pub async fn delete(&self, person_id: &PersonId, delete_images: bool) -> Result<String> {
        let query = [("delete_images", delete_images.to_string())];
        let response: ApiResponse<serde_json::Value> = self
            .client
            .request(Method::DELETE, &person_endpoint(person_id), &query, None::<&()>)
            .await
            .map_err(|e| not_found_as_person(e, person_id))?;

        Ok(response
            .message
            .unwrap_or_else(|| "Person deleted successfully".to_string()))
    }

    /// One page of a person's images, plus the person as the server sees it now
    pub async fn images(
        &self,
        person_id: &PersonId,
        request: &PageRequest,
    ) -> Result<(PageResult<Image>, Option<Person>)> {
        let query = [
            ("page", request.page.to_string()),
            ("per_page", request.per_page.to_string()),
        ];
        let endpoint = format!("{}/images", person_endpoint(person_id));

        let response: ApiResponse<Vec<Image>> = self
            .client
            .request(Method::GET, &endpoint, &query, None::<&()>)
            .await
            .map_err(|e| not_found_as_person(e, person_id))?;

        let person: Option<Person> = response.extra_field("person")?;
        let pagination = response.pagination;
        let images = response.into_data("images")?;
        Ok((PageResult::from_meta(images, pagination, request), person))
    }
}

fn person_endpoint(person_id: &PersonId) -> String {
    format!("/people/{}", person_id)
}

fn not_found_as_person(err: FolioError, person_id: &PersonId) -> FolioError {
    match err {
        FolioError::NotFound { .. } => FolioError::person_not_found(person_id.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::tests::utils::test_helpers::*;
    use serde_json::json;

    fn people_response(count: usize) -> serde_json::Value {
        let people: Vec<_> = (1..=count)
            .map(|i| person_json(&format!("p{}", i), &format!("Person {}", i), i as u32))
            .collect();
        json!({"success": true, "data": people, "total": count})
    }

    #[tokio::test]
    async fn test_page_slices_unpaginated_list() {
        let client = mock_client();
        client.add_response(Method::GET, "/people", people_response(5));
        let service = PersonService::new(&client);

        let request = PageRequest::new(2).with_page(3);
        let page = service
            .page(&request, PersonSort::Name, SortOrder::Asc)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, PersonId::new("p5"));
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn test_list_sends_search_sort_order() {
        let client = mock_client();
        client.add_response(Method::GET, "/people", people_response(1));
        let service = PersonService::new(&client);

        service
            .list(Some("  ada "), PersonSort::ImageCount, SortOrder::Desc)
            .await
            .unwrap();

        let sent = client.last_request(&Method::GET, "/people").unwrap();
        assert_eq!(sent.query_value("search"), Some("ada"));
        assert_eq!(sent.query_value("sort"), Some("image_count"));
        assert_eq!(sent.query_value("order"), Some("desc"));
    }

    #[tokio::test]
    async fn test_create_validates_before_request() {
        let client = mock_client();
        let service = PersonService::new(&client);

        let err = service.create("   ").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(client.requests().is_empty());

        let too_long = "x".repeat(256);
        assert!(service.create(&too_long).await.is_err());
    }

    #[tokio::test]
    async fn test_create_duplicate_name() {
        let client = mock_client();
        client.add_response(
            Method::POST,
            "/people",
            json!({"success": false, "error": "A person with this name already exists"}),
        );
        let service = PersonService::new(&client);

        let err = service.create("Ada").await.unwrap_err();
        assert!(err.is_application_error());
        let sent = client.last_request(&Method::POST, "/people").unwrap();
        assert_eq!(sent.body, Some(json!({"name": "Ada"})));
    }

    #[tokio::test]
    async fn test_delete_passes_delete_images_flag() {
        let client = mock_client();
        client.add_response(
            Method::DELETE,
            "/people/p1",
            message_envelope("Person deleted successfully"),
        );
        let service = PersonService::new(&client);

        service.delete(&PersonId::new("p1"), true).await.unwrap();

        let sent = client.last_request(&Method::DELETE, "/people/p1").unwrap();
        assert_eq!(sent.query_value("delete_images"), Some("true"));
    }

    #[tokio::test]
    async fn test_images_returns_person() {
        let client = mock_client();
        let mut envelope = list_envelope(vec![image_json("a", Some("p1"))], 1, 20, 1);
        envelope["person"] = person_json("p1", "Ada", 1);
        client.add_response(Method::GET, "/people/p1/images", envelope);
        let service = PersonService::new(&client);

        let (page, person) = service
            .images(&PersonId::new("p1"), &PageRequest::new(20))
            .await
            .unwrap();

        assert_eq!(page.total_count, 1);
        assert_eq!(person.unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_get_maps_not_found() {
        let client = mock_client();
        client.add_error(Method::GET, "/people/x", FolioError::not_found("Person not found"));
        let service = PersonService::new(&client);

        let err = service.get(&PersonId::new("x")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PersonNotFound);
    }
}
