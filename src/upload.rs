use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use facefolio_protocol::api::UploadFileResult;

use crate::client::{ApiClient, FilePayload};
use crate::error::{FolioError, Result};
use crate::image::ImageService;

/// Extensions the server accepts
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

pub fn is_supported_image(path: &Path) -> bool {
    mime_for(path).is_some()
}

pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Expand the paths given on the command line into image files
///
/// Directories contribute their supported images (not recursive). An explicit
/// file with an unsupported extension is an error.
pub fn collect_image_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(FolioError::file_not_found(path.display().to_string()));
        }

        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_supported_image(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if is_supported_image(path) {
            files.push(path.clone());
        } else {
            return Err(FolioError::unsupported_file(format!(
                "{} (expected one of: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }
    }

    if files.is_empty() {
        return Err(FolioError::invalid_input("No image files found"));
    }

    Ok(files)
}

/// Per-file outcome of an upload run
#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    pub results: Vec<UploadFileResult>,
}

impl UploadSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn faces_detected(&self) -> u32 {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.faces_detected)
            .sum()
    }

    pub fn matched(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.success && r.matched_person.is_some())
            .count()
    }

    /// Whether any listing may have changed
    pub fn needs_refresh(&self) -> bool {
        self.succeeded() > 0
    }

    pub fn describe(&self) -> String {
        format!(
            "Uploaded {} of {} files ({} faces detected, {} matched)",
            self.succeeded(),
            self.results.len(),
            self.faces_detected(),
            self.matched()
        )
    }
}

/// Upload service that sends image files in batches
pub struct UploadService<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    progress_enabled: bool,
}

impl<'a, C: ApiClient + ?Sized> UploadService<'a, C> {
    const UPLOAD_BATCH_SIZE: usize = 5;

    pub fn new(client: &'a C, progress_enabled: bool) -> Self {
        Self {
            client,
            progress_enabled,
        }
    }

    /// Upload every image under `paths`
    ///
    /// A batch that fails as a whole marks each of its files as failed and the
    /// remaining batches still run.
    pub async fn upload_paths(&self, paths: &[PathBuf]) -> Result<UploadSummary> {
        let files = collect_image_files(paths)?;
        tracing::info!("Uploading {} image files", files.len());

        let progress_bar = if self.progress_enabled {
            Some(crate::ui::create_progress_bar(
                files.len() as u64,
                "Uploading images...",
            ))
        } else {
            None
        };

        let batch_size = Self::UPLOAD_BATCH_SIZE;
        let total_batches = files.len().div_ceil(batch_size);
        let mut summary = UploadSummary::default();

        for (i, chunk) in files.chunks(batch_size).enumerate() {
            let batch_num = i + 1;
            if let Some(ref pb) = progress_bar {
                pb.set_message(format!("Uploading batch {}/{}", batch_num, total_batches));
            }

            let results = self.process_batch((batch_num, total_batches), chunk).await?;
            summary.results.extend(results);

            if let Some(ref pb) = progress_bar {
                pb.inc(chunk.len() as u64);
            }

            // Small delay between batches
            if batch_num < total_batches {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Upload completed");
        }

        tracing::info!("{}", summary.describe());
        Ok(summary)
    }

    async fn process_batch(
        &self,
        batch_info: (usize, usize),
        chunk: &[PathBuf],
    ) -> Result<Vec<UploadFileResult>> {
        let (batch_num, total_batches) = batch_info;
        let (payloads, mut results) = read_files(chunk).await?;

        if payloads.is_empty() {
            return Ok(results);
        }

        let names: Vec<String> = payloads.iter().map(|p| p.filename.clone()).collect();
        let service = ImageService::new(self.client);

        match service.upload(payloads).await {
            Ok(server_results) => results.extend(server_results),
            Err(e) => {
                tracing::warn!(
                    "Failed to upload batch {}/{}: {}",
                    batch_num,
                    total_batches,
                    e
                );
                results.extend(
                    names
                        .into_iter()
                        .map(|name| UploadFileResult::failed(name, e.to_string())),
                );
            }
        }

        Ok(results)
    }
}

/// Read a batch of files concurrently; unreadable files become failed results
async fn read_files(paths: &[PathBuf]) -> Result<(Vec<FilePayload>, Vec<UploadFileResult>)> {
    let mut tasks = Vec::new();

    for path in paths {
        let path = path.clone();
        tasks.push(tokio::spawn(async move {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let mime = mime_for(&path).unwrap_or("application/octet-stream");
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(FilePayload {
                    filename,
                    bytes,
                    mime,
                }),
                Err(e) => Err((filename, e)),
            }
        }));
    }

    let mut payloads = Vec::new();
    let mut failures = Vec::new();
    for task in tasks {
        let result = task
            .await
            .map_err(|e| FolioError::internal(format!("Task join failed: {}", e)))?;

        match result {
            Ok(payload) => payloads.push(payload),
            Err((filename, e)) => {
                tracing::warn!("Could not read {}: {}", filename, e);
                failures.push(UploadFileResult::failed(filename, e.to_string()));
            }
        }
    }

    Ok((payloads, failures))
}
