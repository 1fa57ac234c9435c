//! Test utilities and helpers for unit tests
//!
//! This module provides common testing utilities including:
//! - Temporary files and directories
//! - JSON builders shaped like the backend's responses
//! - Typed sample records

#[cfg(test)]
pub mod test_helpers {
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::config::ClientConfig;
    use crate::tests::mocks::MockApiClient;
    use facefolio_protocol::common::{Image, Person};

    /// Create a temporary directory for testing
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Create a temporary file with content
    pub fn create_temp_file_with_content(dir: &TempDir, filename: &str, content: &[u8]) -> PathBuf {
        let file_path = dir.path().join(filename);
        std::fs::write(&file_path, content).expect("Failed to write temp file");
        file_path
    }

    pub fn mock_client() -> MockApiClient {
        MockApiClient::new(ClientConfig::default())
    }

    /// Image JSON; a `person_id` makes it identified
    pub fn image_json(id: &str, person_id: Option<&str>) -> Value {
        json!({
            "id": id,
            "url": format!("https://cdn.example.com/{}.jpg", id),
            "original_filename": format!("{}.jpg", id),
            "has_face": true,
            "is_identified": person_id.is_some(),
            "face_count": 1,
            "person_id": person_id,
            "created_at": "2024-05-01T09:30:00.000000"
        })
    }

    pub fn person_json(id: &str, name: &str, image_count: u32) -> Value {
        json!({
            "id": id,
            "name": name,
            "thumbnail_url": null,
            "image_count": image_count,
            "created_at": "2024-04-01T12:00:00",
            "updated_at": "2024-04-02T12:00:00"
        })
    }

    /// List envelope with server-computed pagination
    pub fn list_envelope(data: Vec<Value>, page: u32, per_page: u32, total: u64) -> Value {
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page as u64)
        };
        json!({
            "success": true,
            "data": data,
            "pagination": {"page": page, "per_page": per_page, "total": total, "pages": pages}
        })
    }

    pub fn data_envelope(data: Value) -> Value {
        json!({ "success": true, "data": data })
    }

    pub fn message_envelope(message: &str) -> Value {
        json!({ "success": true, "message": message })
    }

    pub fn sample_image(id: &str, person_id: Option<&str>) -> Image {
        serde_json::from_value(image_json(id, person_id)).expect("valid image json")
    }

    pub fn sample_person(id: &str, name: &str, image_count: u32) -> Person {
        serde_json::from_value(person_json(id, name, image_count)).expect("valid person json")
    }

    /// `count` unidentified images named img1..imgN
    pub fn unidentified_images(count: usize) -> Vec<Image> {
        (1..=count)
            .map(|i| sample_image(&format!("img{}", i), None))
            .collect()
    }
}
