//! Dashboard statistics

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_images: u64,
    pub total_people: u64,
    pub identified_images: u64,
    pub unidentified_faces: u64,
    /// Percentage of images with an identified person, rounded to one decimal
    pub identification_rate: f64,
}
