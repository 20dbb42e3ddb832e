use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error taxonomy for the upload-and-plot pipeline
///
/// Every failure the service can report maps onto one of these variants.
/// Validation and parsing errors fire before any durable write; storage and
/// rendering errors can occur after partial work and carry enough context to
/// tell the caller what did happen.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested Y-axis column is empty or absent from the dataset schema
    #[error("y-axis key '{0}' not found in the data columns")]
    MissingYAxis(String),

    /// Plot type outside {single, multiple}
    #[error("invalid plot type '{0}', must be 'single' or 'multiple'")]
    InvalidPlotType(String),

    /// Graph type outside {line, scatter, bar}
    #[error("invalid graph type '{0}', must be 'line', 'scatter' or 'bar'")]
    InvalidGraphType(String),

    /// Other malformed request fields (missing multipart parts, bad names)
    #[error("{0}")]
    Validation(String),

    /// Uploaded file is neither .xlsx nor .csv
    #[error("unsupported file type '{0}', please provide an .xlsx or .csv file")]
    UnsupportedFormat(String),

    /// Parsed sheet/file yielded zero data rows
    #[error("the uploaded file contains no data rows")]
    EmptyDataset,

    /// User or file does not exist
    #[error("{0}")]
    NotFound(String),

    /// Bad credentials or duplicate registration
    #[error("{0}")]
    Auth(String),

    /// Chart rendering failed or timed out
    #[error("failed to render chart: {0}")]
    Render(String),

    /// Storage write failed; the message names any artifacts that did persist
    #[error("failed to write to storage: {0}")]
    Persistence(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingYAxis(_)
            | AppError::InvalidPlotType(_)
            | AppError::InvalidGraphType(_)
            | AppError::Validation(_)
            | AppError::UnsupportedFormat(_)
            | AppError::EmptyDataset
            | AppError::Auth(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Render(_) | AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
