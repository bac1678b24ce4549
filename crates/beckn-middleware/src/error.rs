use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use beckn_core::error::BecknError;
use beckn_core::types::Nack;

/// Maps any `BecknError` to the Beckn NACK envelope and an HTTP status,
/// mirroring the teacher's `rpc_err` error-to-wire-shape mapping but
/// producing the spec's NACK JSON instead of a JSON-RPC `ErrorObject`.
pub fn beckn_error_response(err: &BecknError) -> Response {
    let status = status_for(err);
    let nack = Nack::new(kind_for(err), err.nack_code(), err.to_string());
    (status, Json(nack)).into_response()
}

fn status_for(err: &BecknError) -> StatusCode {
    use BecknError::*;
    match err {
        MalformedBody(_) | MissingContextField(_) | ActionMismatch { .. } => StatusCode::BAD_REQUEST,
        MissingAuthHeader | MalformedAuthHeader(_) | SignatureInvalid | UnsupportedAlgorithm(_) => {
            StatusCode::UNAUTHORIZED
        }
        UnknownSubscriber { .. } => StatusCode::UNAUTHORIZED,
        RateLimited => StatusCode::TOO_MANY_REQUESTS,
        DuplicateMessage | PolicyViolation(_) | FinderFeeInvalid => StatusCode::BAD_REQUEST,
        SubscriberAlreadyExists { .. } => StatusCode::CONFLICT,
        UnexpectedSubscriberState { .. } | ChallengeFailed | MissingKeyMaterial | OnSubscribeFailed => {
            StatusCode::BAD_REQUEST
        }
        BrokerUnavailable | DeadLettered(_) | Storage(_) | Serialization(_) | OutboundRequest(_) | Other(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn kind_for(err: &BecknError) -> &'static str {
    use BecknError::*;
    match err {
        MalformedBody(_)
        | MissingContextField(_)
        | ActionMismatch { .. }
        | MissingAuthHeader
        | MalformedAuthHeader(_)
        | SignatureInvalid
        | UnsupportedAlgorithm(_)
        | UnknownSubscriber { .. } => "CONTEXT-ERROR",
        _ => "POLICY-ERROR",
    }
}

/// Newtype so `?` can turn a `BecknError` directly into an axum response
/// from within a handler, without implementing a foreign trait on a
/// foreign type.
pub struct MiddlewareError(pub BecknError);

impl From<BecknError> for MiddlewareError {
    fn from(e: BecknError) -> Self {
        MiddlewareError(e)
    }
}

impl IntoResponse for MiddlewareError {
    fn into_response(self) -> Response {
        beckn_error_response(&self.0)
    }
}
