//! Wire types for the image organizer API
//!
//! - `common`: records shared by several endpoints (images, people, pagination, stats)
//! - `api`: request/response DTOs grouped by resource

pub mod api;
pub mod common;
