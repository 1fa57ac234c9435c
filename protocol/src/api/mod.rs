//! API DTOs module
//!
//! This module contains all API data transfer objects organized by resource:
//! - `image`: image listing, assignment, reprocessing and upload
//! - `person`: people listing and management
//! - `stats`: dashboard statistics and health

pub mod image;
pub mod person;
pub mod stats;

pub use image::*;
pub use person::*;
pub use stats::*;
