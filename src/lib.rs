//! Client library for the face recognition photo organizer API
//!
//! - [`client`]: HTTP transport and the response envelope
//! - [`image`], [`person`], [`stats`]: typed services over the endpoints
//! - [`collection`]: paginated, filterable collections with optimistic mutations
//! - [`gallery`]: collection views wired to the services and the [`cache`]
//! - [`cli`], [`browse`]: the `facefolio` terminal front end

pub mod browse;
pub mod cache;
pub mod cli;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod gallery;
pub mod image;
pub mod person;
pub mod stats;
pub mod ui;
pub mod upload;
pub mod version;

pub use cache::{PageCache, ResourceKind};
pub use client::{ApiClient, ApiResponse, HttpClient};
pub use collection::{Collection, LoadOutcome, MutationEffect, PageRequest, PageResult};
pub use config::{ClientConfig, Config};
pub use error::{ErrorCode, FolioError, Result};
pub use gallery::{ImageGallery, Notifier, PeopleDirectory};

#[cfg(test)]
pub mod tests {
    pub mod mocks;
    pub mod utils;
}
