pub mod id;
pub mod image;
pub mod pagination;
pub mod person;
pub mod stats;

pub use id::*;
pub use image::*;
pub use pagination::*;
pub use person::*;
pub use stats::*;
