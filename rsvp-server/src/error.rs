use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mirror::StoreError;
use rsvp_core::{ExportError, SyncError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("could not issue session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::QuotaExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
        StoreError::Network(_) => StatusCode::BAD_GATEWAY,
        StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Sync(SyncError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Sync(SyncError::Store { source, .. }) => store_status(source),
            ApiError::Store(error) => store_status(error),
            ApiError::Export(_) | ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::debug!("{status}: {self}");
        }
        let message = match &self {
            // the context is what the admin screen shows
            ApiError::Sync(SyncError::Store { context, .. }) => context.to_string(),
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror::StorePath;
    use rsvp_core::ValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(SyncError::from(ValidationError::MissingName)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SyncError::Store {
                context: "Failed to delete RSVP",
                source: StoreError::PermissionDenied {
                    path: StorePath::new("rsvps/x"),
                },
            })
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(StoreError::NotFound {
                path: StorePath::new("backgrounds/x.png"),
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
