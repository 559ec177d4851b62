use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Spot not found with ID: {0}")]
    SpotNotFound(Uuid),

    #[error("User '{user_id}' already upvoted spot {spot_id}")]
    DuplicateUpvote { spot_id: Uuid, user_id: String },

    #[error("Stored data could not be parsed: {0}")]
    DataCorruption(String),

    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found with key: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Satellite tracking API key is not configured")]
    NotConfigured,

    #[error("Satellite tracking request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Satellite tracking API answered with status {0}")]
    UpstreamStatus(u16),

    #[error("Satellite tracking API reported an unrepresentable pass start time: {0}")]
    InvalidPassTime(i64),
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing form field: {0}")]
    MissingFormField(String),
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),
    #[error("Invalid spot ID format: {0}")]
    InvalidUuid(#[from] uuid::Error),

    // Domain/Service level errors
    #[error("Spot not found with ID: {0}")]
    SpotNotFound(Uuid),
    #[error("No spot found for category '{0}'")]
    NoSpotForCategory(String),
    #[error("User '{user_id}' already upvoted spot {spot_id}")]
    AlreadyUpvoted { spot_id: Uuid, user_id: String },
    #[error("Asset not found: {0}")]
    AssetNotFound(String),
    #[error("Database operation failed")]
    RepositoryError(#[source] RepoError),
    #[error("File storage operation failed")]
    StorageError(#[source] StorageError),

    // Satellite tracking API
    #[error("Satellite tracking is not configured")]
    SatelliteApiNotConfigured,
    #[error("Satellite tracking upstream failed")]
    UpstreamError(#[source] EventsError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

// --- Conversions from Domain Errors to AppError ---

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::SpotNotFound(id) => AppError::SpotNotFound(id),
            RepoError::DuplicateUpvote { spot_id, user_id } => {
                AppError::AlreadyUpvoted { spot_id, user_id }
            }
            e @ (RepoError::DataCorruption(_) | RepoError::BackendError(_)) => {
                AppError::RepositoryError(e)
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) | StorageError::InvalidKey(key) => {
                AppError::AssetNotFound(key)
            }
            e => AppError::StorageError(e),
        }
    }
}

impl From<EventsError> for AppError {
    fn from(err: EventsError) -> Self {
        match err {
            EventsError::NotConfigured => AppError::SatelliteApiNotConfigured,
            e => AppError::UpstreamError(e),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_)
            | AppError::MissingFormField(_)
            | AppError::InvalidUuid(_) => StatusCode::BAD_REQUEST,
            // 413 when the body limit tripped, 400 for malformed parts
            AppError::MultipartError(e) => e.status(),
            AppError::SpotNotFound(_)
            | AppError::NoSpotForCategory(_)
            | AppError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyUpvoted { .. } => StatusCode::CONFLICT,
            AppError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            AppError::SatelliteApiNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RepositoryError(_)
            | AppError::StorageError(_)
            | AppError::ConfigError(_)
            | AppError::InitError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::MissingFormField(field) => format!("Missing form field: {}", field),
            AppError::MultipartError(e) => format!("Invalid multipart form data: {}", e),
            AppError::InvalidUuid(e) => format!("Invalid ID format: {}", e),
            AppError::SpotNotFound(id) => format!("Spot not found with ID: {}", id),
            AppError::NoSpotForCategory(_) => "No spot found for this category".to_string(),
            AppError::AlreadyUpvoted { .. } => "Already upvoted".to_string(),
            AppError::AssetNotFound(_) => "Asset not found".to_string(),

            // 5xx Server Errors; causes are logged, never returned
            AppError::RepositoryError(_) => "Database operation failed".to_string(),
            AppError::StorageError(_) => "File storage operation failed".to_string(),
            AppError::UpstreamError(_) => "Satellite tracking service unavailable".to_string(),
            AppError::SatelliteApiNotConfigured => "Satellite tracking is not configured".to_string(),
            AppError::ConfigError(_) => "Server configuration error".to_string(),
            AppError::InitError(_) => "Server initialization error".to_string(),
            AppError::InternalServerError(_) => "An internal server error occurred".to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error.message = %error_message, error.detail = ?self, error.status = %status, "Responding with error");
        } else {
            tracing::warn!(error.message = %error_message, error.detail = %self, error.status = %status, "Responding with error");
        }

        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_upvote_is_conflict() {
        let err: AppError = RepoError::DuplicateUpvote {
            spot_id: Uuid::new_v4(),
            user_id: "u1".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn backend_failures_are_server_errors() {
        let err: AppError = RepoError::BackendError(anyhow::anyhow!("table gone")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = StorageError::UploadFailed("disk full".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_assets_are_not_found() {
        let err: AppError = StorageError::InvalidKey("../etc/passwd".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unconfigured_satellite_api_is_unavailable() {
        let err: AppError = EventsError::NotConfigured.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err: AppError = EventsError::UpstreamStatus(500).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err: AppError = EventsError::InvalidPassTime(i64::MAX).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn server_error_body_is_redacted() {
        let err = AppError::RepositoryError(RepoError::BackendError(anyhow::anyhow!(
            "secret connection string"
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Database operation failed");
    }
}
