//! HTTP client implementations for the image organizer API

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use facefolio_protocol::common::PageMeta;

use crate::config::ClientConfig;
use crate::error::{FolioError, Result};

/// API response envelope
///
/// Every endpoint answers `{ success, data?, error?, message? }`; list endpoints add
/// `pagination`, and a few endpoints put their payload beside `data` (`person`,
/// `results`, `faces_detected`, ...). Those siblings are kept in `extra`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub pagination: Option<PageMeta>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl<T> ApiResponse<T> {
    /// Decode one sibling field of `data`
    pub fn extra_field<E: DeserializeOwned>(&self, key: &str) -> Result<Option<E>> {
        match self.extra.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Decode all sibling fields of `data` as one struct
    pub fn extras<E: DeserializeOwned>(&self) -> Result<E> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.extra.clone(),
        ))?)
    }

    /// Take `data`, failing when the server sent none
    pub fn into_data(self, what: &str) -> Result<T> {
        self.data
            .ok_or_else(|| FolioError::invalid_response(200, format!("No {} in response", what)))
    }
}

/// Turn a raw HTTP answer into an envelope or an error
pub fn decode_response<R: DeserializeOwned>(status: u16, body: &str) -> Result<ApiResponse<R>> {
    let status_ok = (200..300).contains(&status);

    match serde_json::from_str::<ApiResponse<R>>(body) {
        Ok(api_response) => {
            if api_response.success == Some(false) || !status_ok {
                let error_message = api_response
                    .error
                    .or(api_response.message)
                    .unwrap_or_else(|| "Unknown API error".to_string());
                if status == 404 {
                    return Err(FolioError::not_found(error_message));
                }
                return Err(FolioError::api(status, error_message));
            }
            Ok(api_response)
        }
        Err(_) if !status_ok => Err(FolioError::api(
            status,
            format!("HTTP {}: {}", status, truncate(body, 200)),
        )),
        Err(e) => Err(FolioError::invalid_response(
            status,
            format!("Invalid API response ({}): {}", e, truncate(body, 200)),
        )),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// One file to send to the upload endpoint
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Seam between the services and the transport
#[allow(async_fn_in_trait)]
pub trait ApiClient {
    fn config(&self) -> &ClientConfig;

    async fn request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        payload: Option<&T>,
    ) -> Result<ApiResponse<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned;

    /// POST the files as multipart field `files`
    async fn upload<R>(&self, endpoint: &str, files: Vec<FilePayload>) -> Result<ApiResponse<R>>
    where
        R: DeserializeOwned;
}

/// reqwest-backed client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder().timeout(Duration::from_secs(config.timeout));

        if !config.use_proxy {
            client_builder = client_builder.no_proxy();
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request_builder: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<R>> {
        let response = request_builder.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        tracing::debug!("<- {} ({} bytes)", status, response_text.len());
        decode_response(status.as_u16(), &response_text)
    }
}

impl ApiClient for HttpClient {
    fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        payload: Option<&T>,
    ) -> Result<ApiResponse<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint_url(endpoint);
        tracing::debug!("-> {} {} {:?}", method, url, query);

        let mut request_builder = self
            .client
            .request(method, &url)
            .header("Accept", "application/json");

        if !query.is_empty() {
            request_builder = request_builder.query(query);
        }

        if let Some(data) = payload {
            request_builder = request_builder.json(data);
        }

        self.send(request_builder).await
    }

    async fn upload<R>(&self, endpoint: &str, files: Vec<FilePayload>) -> Result<ApiResponse<R>>
    where
        R: DeserializeOwned,
    {
        let url = self.config.endpoint_url(endpoint);
        tracing::debug!("-> POST {} ({} files)", url, files.len());

        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.filename)
                .mime_str(file.mime)?;
            form = form.part("files", part);
        }

        let request_builder = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .multipart(form);

        self.send(request_builder).await
    }
}
