use application::{ApplicationError, ErrorKind};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                message: message.into(),
                status_code: status.as_u16(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let kind = error.kind();
        if kind == ErrorKind::Internal {
            tracing::error!(error = %error, "request failed");
        }
        ApiError::new(status_for(kind), error.public_message())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DomainError, RepositoryError};

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (ApplicationError::from(DomainError::RoomNotFound), 404),
            (ApplicationError::from(DomainError::RoomNameTaken), 409),
            (
                ApplicationError::from(DomainError::NotMessageAuthor { action: "delete" }),
                403,
            ),
            (ApplicationError::unauthenticated("invalid credentials"), 401),
            (
                ApplicationError::from(DomainError::invalid_argument("name", "cannot be empty")),
                400,
            ),
            (ApplicationError::from(RepositoryError::storage("boom")), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status().as_u16(), status);
        }
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::from(ApplicationError::from(RepositoryError::storage(
            "password authentication failed for user postgres",
        )));
        assert_eq!(err.body.message, "internal server error");
        assert_eq!(err.body.status_code, 500);
    }
}
