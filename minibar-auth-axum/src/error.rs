use http::StatusCode;
use minibar_auth::{CoordinationError, PasskeyError};

/// Helper trait converting operation-layer errors into the `(status, body)`
/// pairs axum handlers return.
pub(crate) trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = match &e {
                CoordinationError::Unauthorized => StatusCode::UNAUTHORIZED,
                // The client falls back to its registration screen on 404
                CoordinationError::Passkey(PasskeyError::NoCredentials) => StatusCode::NOT_FOUND,
                CoordinationError::Passkey(PasskeyError::Storage(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                CoordinationError::Passkey(_) => StatusCode::BAD_REQUEST,
                CoordinationError::Session(_) => StatusCode::BAD_REQUEST,
                CoordinationError::User(minibar_auth::UserError::Storage(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                CoordinationError::User(_) => StatusCode::BAD_REQUEST,
                CoordinationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })
    }
}
