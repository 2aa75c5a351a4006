use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use marketplace_engine::{OrderFlowError, PaymentFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("{0}")]
    PaymentFlow(#[from] PaymentFlowError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::OrderFlow(e) => match e {
                OrderFlowError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderFlowError::Conflict(_) => StatusCode::CONFLICT,
                OrderFlowError::Permission(_) => StatusCode::FORBIDDEN,
                OrderFlowError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                OrderFlowError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderFlowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::PaymentFlow(e) => match e {
                PaymentFlowError::Validation(_) => StatusCode::BAD_REQUEST,
                PaymentFlowError::Conflict(_) => StatusCode::CONFLICT,
                PaymentFlowError::Permission(_) => StatusCode::FORBIDDEN,
                PaymentFlowError::InvalidState(_) => StatusCode::BAD_REQUEST,
                PaymentFlowError::RefundDeclined(_) => StatusCode::BAD_REQUEST,
                PaymentFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                PaymentFlowError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
                PaymentFlowError::Gateway(_) => StatusCode::BAD_GATEWAY,
                PaymentFlowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn taxonomy_maps_to_the_documented_status_codes() {
        let cases: Vec<(ServerError, StatusCode)> = vec![
            (OrderFlowError::Validation("x".into()).into(), StatusCode::BAD_REQUEST),
            (OrderFlowError::Conflict("x".into()).into(), StatusCode::CONFLICT),
            (OrderFlowError::NotFound(1).into(), StatusCode::NOT_FOUND),
            (PaymentFlowError::Conflict("x".into()).into(), StatusCode::CONFLICT),
            (
                PaymentFlowError::Gateway(marketplace_engine::gateway::GatewayError::Timeout).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (AuthError::MissingToken.into(), StatusCode::UNAUTHORIZED),
            (AuthError::InsufficientPermissions("x".into()).into(), StatusCode::FORBIDDEN),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err}");
        }
    }

    #[test]
    fn error_bodies_are_json_documents() {
        let err: ServerError = OrderFlowError::NotFound(42).into();
        let res = err.error_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
