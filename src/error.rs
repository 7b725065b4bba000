use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failure while reading or writing workbook bytes
#[derive(Debug, Error)]
pub enum SheetError {
    /// The uploaded bytes are not a readable `.xlsx` workbook
    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    /// The row set could not be serialized into a workbook
    #[error("failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    /// The blocking codec task panicked or was cancelled
    #[error("codec task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors surfaced by the HTTP handlers
///
/// `MissingFile`, `Multipart` and `NotFound` are reported to the client as-is.
/// Every other variant is logged and answered with the opaque `context`
/// message of the operation that failed.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No file uploaded")]
    MissingFile,

    /// Malformed multipart body or an upload over the size limit
    #[error("{0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("File not found")]
    NotFound,

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{context}: {source}")]
    Sheet {
        context: &'static str,
        #[source]
        source: SheetError,
    },
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::Multipart(err) => err.status(),
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store { .. } | AppError::Sheet { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Store { context, .. } | AppError::Sheet { context, .. } => {
                context.to_string()
            }
            AppError::Multipart(err) => err.body_text(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::debug!("request rejected ({}): {}", status, self);
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Attach an operation message to store and codec failures
pub trait Context<T> {
    fn context(self, context: &'static str) -> Result<T, AppError>;
}

impl<T> Context<T> for Result<T, sqlx::Error> {
    fn context(self, context: &'static str) -> Result<T, AppError> {
        self.map_err(|source| AppError::Store { context, source })
    }
}

impl<T> Context<T> for Result<T, SheetError> {
    fn context(self, context: &'static str) -> Result<T, AppError> {
        self.map_err(|source| AppError::Sheet { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        assert_eq!(AppError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingFile.client_message(), "No file uploaded");
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound.client_message(), "File not found");
    }

    #[test]
    fn server_errors_hide_the_source() {
        let err: Result<(), sqlx::Error> = Err(sqlx::Error::PoolTimedOut);
        let err = err.context("Failed to fetch files").unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Failed to fetch files");
        assert!(err.to_string().starts_with("Failed to fetch files: "));
    }
}
