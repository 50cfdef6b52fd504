use serde::{Deserialize, Serialize};

use super::dto::PageMeta;

/// Successful report payload plus optional pagination block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOk<T> {
    pub data: T,
    pub meta: Option<PageMeta>,
}

/// Failure classes every report operation can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    NotFound,
    Validation,
    Storage,
}

impl FailureKind {
    pub fn http_status(&self) -> u16 {
        match self {
            FailureKind::NotFound => 404,
            FailureKind::Validation => 400,
            FailureKind::Storage => 500,
        }
    }
}

/// Typed failure carried across the service boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ReportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Storage, message)
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl std::fmt::Display for ReportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ReportFailure {}

impl From<anyhow::Error> for ReportFailure {
    fn from(err: anyhow::Error) -> Self {
        ReportFailure::storage(err.to_string())
    }
}

/// Tagged outcome of a report computation; call sites must handle both arms.
pub type ReportResult<T> = Result<ReportOk<T>, ReportFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

/// Uniform wire envelope handed to the transport collaborator. `data` is
/// `null` when a failure has no meaningful payload and an empty list when a
/// scoped report matched nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub status: ResponseStatus,
    #[serde(rename = "httpStatus")]
    pub http_status: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            http_status: 200,
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn ok_with_meta(message: impl Into<String>, data: T, meta: PageMeta) -> Self {
        Self {
            status: ResponseStatus::Success,
            http_status: 200,
            message: message.into(),
            data: Some(data),
            meta: Some(meta),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            http_status: kind.http_status(),
            message: message.into(),
            data: None,
            meta: None,
        }
    }

    /// Failure that still carries a payload, e.g. an empty result list on a
    /// 404 scoped report.
    pub fn failure_with(kind: FailureKind, message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Failure,
            http_status: kind.http_status(),
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

impl<T> From<ReportResult<T>> for ResponseEnvelope<T> {
    fn from(result: ReportResult<T>) -> Self {
        match result {
            Ok(ok) => Self {
                status: ResponseStatus::Success,
                http_status: 200,
                message: String::from("OK"),
                data: Some(ok.data),
                meta: ok.meta,
            },
            Err(failure) => Self::failure(failure.kind, failure.message),
        }
    }
}
