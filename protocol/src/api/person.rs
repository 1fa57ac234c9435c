//! Person API DTOs
//!
//! Data transfer objects for `/people` endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

pub use crate::common::{Person, PersonId};

// ============================================================================
// Listing
// ============================================================================

/// Sort field accepted by GET /people
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonSort {
    #[default]
    Name,
    CreatedAt,
    ImageCount,
}

impl PersonSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonSort::Name => "name",
            PersonSort::CreatedAt => "created_at",
            PersonSort::ImageCount => "image_count",
        }
    }
}

impl FromStr for PersonSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "name" => Ok(PersonSort::Name),
            "created_at" => Ok(PersonSort::CreatedAt),
            "image_count" => Ok(PersonSort::ImageCount),
            other => Err(format!(
                "unknown sort '{}', expected name, created_at or image_count",
                other
            )),
        }
    }
}

impl fmt::Display for PersonSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown order '{}', expected asc or desc", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Management
// ============================================================================

/// Create person request
///
/// Used for POST /people. Names are compared case-insensitively by the server.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePersonRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Update person request
///
/// Used for PUT /people/{person_id}
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePersonRequest {
    #[validate(length(min = 1, max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
