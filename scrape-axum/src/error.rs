use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scrape_core::{ServiceError, StoreError};
use scrape_queue::DispatchError;
use tracing::error;

#[derive(Debug)]
pub struct ApiError(pub anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ServiceError::from(e).into()
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ServiceError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // A ServiceError anywhere in the chain keeps its kind; anything else is a 500.
        let safe = match ServiceError::find(&self.0) {
            Some(service) => service.sanitize_for_client(),
            None => ServiceError::general_error(self.0.to_string()),
        };

        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }
        (status, Json(safe.to_json())).into_response()
    }
}
