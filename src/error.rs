//! Unified error handling for the facefolio SDK and CLI
//!
//! This module provides:
//! - Unique error codes for debugging and documentation
//! - Structured error information with context
//! - Convenient constructor methods
//! - Automatic conversions from common error types
//!
//! Errors coming back from the API fall into two families that are surfaced the
//! same way to the user: network errors (the request never completed) and
//! application errors (the server answered with a structured error).

use std::fmt;
use thiserror::Error;

/// Unified Result type for all facefolio operations
pub type Result<T> = std::result::Result<T, FolioError>;

/// Error codes for facefolio operations
///
/// Each error has a unique code in the format `FXXX` where:
/// - F1XX: Network and API errors
/// - F2XX: File and I/O errors
/// - F3XX: Configuration errors
/// - F4XX: Validation and input errors
/// - F5XX: Resource errors
/// - F6XX: UI and interaction errors
/// - F9XX: Internal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Network (F1XX)
    /// F101: HTTP request failed
    HttpError,
    /// F102: Connection timeout
    ConnectionTimeout,
    /// F103: Connection refused
    ConnectionRefused,
    /// F104: API returned error response
    ApiError,
    /// F105: Invalid API response format
    InvalidResponse,

    // File/IO (F2XX)
    /// F201: File not found
    FileNotFound,
    /// F202: File read error
    FileReadError,
    /// F203: File write error
    FileWriteError,
    /// F204: Unsupported file type
    UnsupportedFile,

    // Configuration (F3XX)
    /// F301: Configuration error
    ConfigError,
    /// F302: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (F4XX)
    /// F401: Invalid input
    InvalidInput,
    /// F402: Validation failed
    ValidationFailed,
    /// F403: Page out of range
    PageOutOfRange,

    // Resource (F5XX)
    /// F501: Resource not found
    ResourceNotFound,
    /// F502: Image not found
    ImageNotFound,
    /// F503: Person not found
    PersonNotFound,
    /// F504: Upload failed
    UploadFailed,

    // UI (F6XX)
    /// F601: Dialog error
    DialogError,
    /// F602: User cancelled
    UserCancelled,

    // Internal (F9XX)
    /// F901: Internal error
    InternalError,
    /// F902: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::HttpError => 101,
            ErrorCode::ConnectionTimeout => 102,
            ErrorCode::ConnectionRefused => 103,
            ErrorCode::ApiError => 104,
            ErrorCode::InvalidResponse => 105,

            ErrorCode::FileNotFound => 201,
            ErrorCode::FileReadError => 202,
            ErrorCode::FileWriteError => 203,
            ErrorCode::UnsupportedFile => 204,

            ErrorCode::ConfigError => 301,
            ErrorCode::InvalidEndpoint => 302,

            ErrorCode::InvalidInput => 401,
            ErrorCode::ValidationFailed => 402,
            ErrorCode::PageOutOfRange => 403,

            ErrorCode::ResourceNotFound => 501,
            ErrorCode::ImageNotFound => 502,
            ErrorCode::PersonNotFound => 503,
            ErrorCode::UploadFailed => 504,

            ErrorCode::DialogError => 601,
            ErrorCode::UserCancelled => 602,

            ErrorCode::InternalError => 901,
            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "F101")
    pub fn as_str(&self) -> String {
        format!("F{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.code())
    }
}

/// Main error type for all facefolio operations
#[derive(Error, Debug)]
pub enum FolioError {
    // ==================== Network Errors (F1XX) ====================
    /// HTTP/Network error
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// API error with status code
    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    // ==================== File/IO Errors (F2XX) ====================
    /// File or IO error
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (F3XX) ====================
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (F4XX) ====================
    #[error("[{code}] Validation error: {message}")]
    Validation {
        code: ErrorCode,
        message: String,
        field: Option<String>,
    },

    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== Resource Errors (F5XX) ====================
    /// Resource not found, as reported by the server
    #[error("[{code}] Not found: {resource}")]
    NotFound { code: ErrorCode, resource: String },

    #[error("[{code}] Upload failed: {message}")]
    Upload { code: ErrorCode, message: String },

    // ==================== UI Errors (F6XX) ====================
    #[error("[{code}] UI error: {message}")]
    Ui { code: ErrorCode, message: String },

    // ==================== Internal Errors (F9XX) ====================
    #[error("[{code}] Internal error: {message}")]
    Internal { code: ErrorCode, message: String },

    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

// ==================== Constructor Methods ====================

impl FolioError {
    // --- Network ---

    /// Create network error from message
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::HttpError,
            message: message.into(),
            source: None,
        }
    }

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
        }
    }

    /// Create invalid response error
    pub fn invalid_response(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::InvalidResponse,
            status,
            message: message.into(),
        }
    }

    // --- File/IO ---

    /// Create IO error from std::io::Error
    pub fn io_from_error(context: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::FileWriteError,
            _ => ErrorCode::FileReadError,
        };

        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create file not found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::FileNotFound,
            context: "File not found".to_string(),
            message: path.into(),
            source: None,
        }
    }

    /// Create unsupported file type error
    pub fn unsupported_file(path: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::UnsupportedFile,
            context: "Unsupported file type".to_string(),
            message: path.into(),
            source: None,
        }
    }

    // --- Configuration ---

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    pub fn config_from_error(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create page out of range error
    pub fn page_out_of_range(page: u32, total_pages: u32) -> Self {
        Self::Validation {
            code: ErrorCode::PageOutOfRange,
            message: format!("page {} is outside 1..={}", page, total_pages.max(1)),
            field: Some("page".to_string()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- Resource ---

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::ResourceNotFound,
            resource: resource.into(),
        }
    }

    pub fn image_not_found(image: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::ImageNotFound,
            resource: image.into(),
        }
    }

    pub fn person_not_found(person: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::PersonNotFound,
            resource: person.into(),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            code: ErrorCode::UploadFailed,
            message: message.into(),
        }
    }

    // --- UI ---

    pub fn ui(message: impl Into<String>) -> Self {
        Self::Ui {
            code: ErrorCode::DialogError,
            message: message.into(),
        }
    }

    /// Create user cancelled error
    pub fn user_cancelled() -> Self {
        Self::Ui {
            code: ErrorCode::UserCancelled,
            message: "Operation cancelled by user".to_string(),
        }
    }

    // --- Internal ---

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network { code, .. } => *code,
            Self::Api { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Upload { code, .. } => *code,
            Self::Ui { code, .. } => *code,
            Self::Internal { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
        }
    }

    /// The request never completed
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// The server answered with a structured error
    pub fn is_application_error(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::NotFound { .. })
    }

    /// Check if the user backed out of a prompt
    pub fn is_cancelled(&self) -> bool {
        self.code() == ErrorCode::UserCancelled
    }
}

// ==================== From Implementations ====================

impl From<std::io::Error> for FolioError {
    fn from(err: std::io::Error) -> Self {
        Self::io_from_error("IO operation", err)
    }
}

impl From<reqwest::Error> for FolioError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for FolioError {
    fn from(err: config::ConfigError) -> Self {
        Self::config_from_error(err)
    }
}

impl From<dialoguer::Error> for FolioError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                Self::user_cancelled()
            }
            err => Self::ui(format!("Dialog error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for FolioError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::validation(err.to_string())
    }
}

// Manual Clone implementation that drops non-cloneable sources
impl Clone for FolioError {
    fn clone(&self) -> Self {
        match self {
            Self::Network { code, message, .. } => Self::Network {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Api {
                code,
                status,
                message,
            } => Self::Api {
                code: *code,
                status: *status,
                message: message.clone(),
            },
            Self::Io {
                code,
                context,
                message,
                ..
            } => Self::Io {
                code: *code,
                context: context.clone(),
                message: message.clone(),
                source: None,
            },
            Self::Config { code, message, .. } => Self::Config {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Validation {
                code,
                message,
                field,
            } => Self::Validation {
                code: *code,
                message: message.clone(),
                field: field.clone(),
            },
            Self::InvalidInput { code, message } => Self::InvalidInput {
                code: *code,
                message: message.clone(),
            },
            Self::NotFound { code, resource } => Self::NotFound {
                code: *code,
                resource: resource.clone(),
            },
            Self::Upload { code, message } => Self::Upload {
                code: *code,
                message: message.clone(),
            },
            Self::Ui { code, message } => Self::Ui {
                code: *code,
                message: message.clone(),
            },
            Self::Internal { code, message } => Self::Internal {
                code: *code,
                message: message.clone(),
            },
            Self::Serialization { code, message, .. } => Self::Serialization {
                code: *code,
                message: message.clone(),
                source: None,
            },
        }
    }
}
