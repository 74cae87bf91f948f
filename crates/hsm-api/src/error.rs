use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use hsm_domain::HsmError;
use serde::Serialize;

/// RFC-7807 problem details; every error response on the API is one.
#[derive(Debug, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, detail: detail.into() }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, detail: detail.into() }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        ApiError { status: StatusCode::CONFLICT, detail: detail.into() }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let problem = Problem {
            type_uri: "about:blank".to_string(),
            title: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            detail: self.detail,
            status: self.status.as_u16(),
        };
        let body = serde_json::to_vec(&problem).unwrap_or_default();
        (
            self.status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            body,
        )
            .into_response()
    }
}

impl From<HsmError> for ApiError {
    fn from(e: HsmError) -> Self {
        let status = match &e {
            HsmError::BadId(_)
            | HsmError::BadType(_)
            | HsmError::ArgMissing(_)
            | HsmError::ArgNoMatch(_)
            | HsmError::ArgTooMany(_)
            | HsmError::LockBadProcessingModel(_)
            | HsmError::LockBadDuration(_)
            | HsmError::LockBadKey
            | HsmError::LockExpired => StatusCode::BAD_REQUEST,
            HsmError::NotFound(_) => StatusCode::NOT_FOUND,
            HsmError::DuplicateKey(_)
            | HsmError::ExclusiveGroup { .. }
            | HsmError::ExclusivePartition(_) => StatusCode::CONFLICT,
            HsmError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            HsmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal details stay in the log, not on the wire.
        let detail = match &e {
            HsmError::Internal(_) => "failed to query DB".to_string(),
            other => other.to_string(),
        };
        ApiError { status, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http() {
        assert_eq!(
            ApiError::from(HsmError::BadType("foo".to_string())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(HsmError::NotFound("x".to_string())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(HsmError::DuplicateKey("NID 1".to_string())).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(HsmError::Closed).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(HsmError::LockBadDuration(16)).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_detail_is_generic() {
        let e = ApiError::from(HsmError::Internal("connection pool exploded".to_string()));
        assert_eq!(e.detail, "failed to query DB");
    }
}
