//! Image API DTOs
//!
//! Data transfer objects for `/images` endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use crate::common::{Image, ImageId, PersonId};

// ============================================================================
// Listing
// ============================================================================

/// Status filter accepted by GET /images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFilter {
    #[default]
    All,
    Identified,
    Unidentified,
}

impl ImageFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFilter::All => "all",
            ImageFilter::Identified => "identified",
            ImageFilter::Unidentified => "unidentified",
        }
    }
}

impl fmt::Display for ImageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ImageFilter::All),
            "identified" => Ok(ImageFilter::Identified),
            "unidentified" => Ok(ImageFilter::Unidentified),
            other => Err(format!(
                "unknown filter '{}', expected all, identified or unidentified",
                other
            )),
        }
    }
}

// ============================================================================
// Assignment
// ============================================================================

/// Assign request
///
/// Used for PATCH /images/{image_id}/assign. A null `person_id` unassigns the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignImageRequest {
    pub person_id: Option<PersonId>,
}

// ============================================================================
// Reprocessing
// ============================================================================

/// Reprocess response
///
/// POST /images/{image_id}/reprocess reports its result at the top level of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprocessResponse {
    #[serde(default)]
    pub faces_detected: u32,
    #[serde(default)]
    pub matched_person: Option<PersonId>,
}

// ============================================================================
// Upload
// ============================================================================

/// Per-file outcome of POST /images/upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFileResult {
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub faces_detected: u32,
    #[serde(default)]
    pub matched_person: Option<PersonId>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UploadFileResult {
    /// Local failure for a file that never reached the server
    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            success: false,
            image: None,
            faces_detected: 0,
            matched_person: None,
            error: Some(error.into()),
        }
    }
}

/// Upload response
///
/// The per-file list is returned under `results`, not `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub results: Vec<UploadFileResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        assert_eq!("Unidentified".parse::<ImageFilter>(), Ok(ImageFilter::Unidentified));
        assert_eq!(" all ".parse::<ImageFilter>(), Ok(ImageFilter::All));
        assert!("people".parse::<ImageFilter>().is_err());
    }

    #[test]
    fn test_assign_request_serializes_null_owner() {
        let json = serde_json::to_string(&AssignImageRequest { person_id: None }).unwrap();
        assert_eq!(json, r#"{"person_id":null}"#);
    }

    #[test]
    fn test_upload_result_from_server() {
        let result: UploadFileResult = serde_json::from_str(
            r#"{"filename":"a.jpg","success":false,"error":"File type not allowed"}"#,
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.faces_detected, 0);
        assert_eq!(result.error.as_deref(), Some("File type not allowed"));
    }
}
