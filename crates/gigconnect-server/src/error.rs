use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gigconnect_shared::MessagingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Messaging(e) => match e {
                MessagingError::MessageNotFound(_) | MessagingError::ConversationNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                MessagingError::InvalidParticipants(_) => StatusCode::UNPROCESSABLE_ENTITY,
                MessagingError::InvalidDraft(_) => StatusCode::BAD_REQUEST,
                MessagingError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Messaging(MessagingError::StorageUnavailable(detail)) => {
                tracing::error!(error = %detail, "storage unavailable");
                "Storage unavailable".to_string()
            }
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use gigconnect_shared::{MessageId, ParticipantsError, Role};

    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ServerError::from(MessagingError::MessageNotFound(MessageId(1))),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::from(MessagingError::InvalidParticipants(
                    ParticipantsError::SameRole(Role::Freelancer),
                )),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServerError::from(MessagingError::StorageUnavailable("disk".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
