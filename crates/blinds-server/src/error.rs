use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blinds_core::BlindsError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BlindsError::InvalidCommand(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<BlindsError>() {
            Some(BlindsError::InvalidCommand(_) | BlindsError::InvalidConfig(_)) => {
                StatusCode::BAD_REQUEST
            }
            Some(
                BlindsError::ActuatorFault { .. }
                | BlindsError::Persistence(_)
                | BlindsError::Io(_)
                | BlindsError::Yaml(_)
                | BlindsError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_command_maps_to_400() {
        let err = AppError(BlindsError::InvalidCommand("explode".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_config_maps_to_400() {
        let err = AppError(BlindsError::InvalidConfig("pins".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn actuator_fault_maps_to_500() {
        let err = AppError(
            BlindsError::ActuatorFault {
                pin: 28,
                reason: "gone".into(),
            }
            .into(),
        );
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("boom"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
