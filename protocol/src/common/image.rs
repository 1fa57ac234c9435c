//! Image records

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{ImageId, Person, PersonId};

/// Image as returned by list, detail and upload endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub url: String,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub has_face: bool,
    #[serde(default)]
    pub is_identified: bool,
    #[serde(default)]
    pub face_count: u32,
    #[serde(default)]
    pub person_id: Option<PersonId>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    /// Embedded owner, only present on endpoints that join people
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
}

impl Image {
    /// Name to show for the image, falling back to its id
    pub fn display_name(&self) -> &str {
        self.original_filename
            .as_deref()
            .unwrap_or_else(|| self.id.as_str())
    }
}
