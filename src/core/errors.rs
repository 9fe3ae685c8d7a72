use thiserror::Error;
use super::types::{MediaSlot, UploadId};
use crate::utils::format_bytes;

/// 单个文件上传失败的原因
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    SizeLimit {
        size: u64,
        limit: u64,
    },

    #[error("Storage rejected upload: status code {status}, message: {message}")]
    Rejected {
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// 准入检查失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionReason {
    TooManyFiles {
        slot: MediaSlot,
        existing: usize,
        submitted: usize,
        max: usize,
    },
    Empty {
        slot: MediaSlot,
    },
}

impl std::fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionReason::TooManyFiles { slot, existing, submitted, max } => write!(
                f,
                "{} holds {} of {} entries, cannot accept {} more",
                slot, existing, max, submitted
            ),
            AdmissionReason::Empty { slot } => write!(f, "no files supplied for {}", slot),
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Admission rejected: {0}")]
    AdmissionRejected(AdmissionReason),

    #[error("Batch failed at upload {upload_id} ({name}): {source}")]
    Batch {
        upload_id: UploadId,
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("Backend rejected request: {message}")]
    BackendRejection {
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn backend_rejection(message: impl Into<String>) -> Self {
        Self::BackendRejection {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 准入阶段的错误（还没有发出任何网络请求）
    pub fn is_admission(&self) -> bool {
        matches!(self, UploadError::AdmissionRejected(_))
    }

    /// 展示给用户的错误文案
    pub fn user_message(&self) -> String {
        match self {
            UploadError::AdmissionRejected(AdmissionReason::TooManyFiles { slot: MediaSlot::Cover, .. })
            | UploadError::AdmissionRejected(AdmissionReason::Empty { slot: MediaSlot::Cover }) => {
                "You can only upload 1 image for the cover.".to_string()
            }
            UploadError::AdmissionRejected(AdmissionReason::TooManyFiles { max, .. }) => {
                format!("You can only upload {} images per service", max)
            }
            UploadError::AdmissionRejected(AdmissionReason::Empty { .. }) => {
                "Select at least one image to upload".to_string()
            }
            UploadError::Batch { source, .. } => match source {
                TransportError::SizeLimit { limit, .. } => {
                    format!("Image upload failed ({} max per image)", format_bytes(*limit))
                }
                _ => "Image upload failed".to_string(),
            },
            UploadError::BackendRejection { message } => message.clone(),
            UploadError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
