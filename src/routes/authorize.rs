use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;

use super::AppState;
use crate::authz::{AuthorizerRequest, DecisionError};

impl IntoResponse for DecisionError {
    fn into_response(self) -> Response {
        match self {
            DecisionError::Fail { code, message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Fail", "code": code, "message": message })),
            )
                .into_response(),
            DecisionError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
        }
    }
}

/// Decide one request.
///
/// The whole decision is bounded by `server.grant_timeout_secs`; only the
/// grant lookup can block.
#[tracing::instrument(name = "routes.authorize", skip_all)]
pub async fn authorize(
    State(state): State<AppState>,
    payload: Result<Json<AuthorizerRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return rejection.into_response();
        }
        Err(rejection) => {
            return DecisionError::Fail {
                code: "malformed_request",
                message: rejection.body_text(),
            }
            .into_response();
        }
    };

    let timeout = state.config.server.grant_timeout();
    match tokio::time::timeout(timeout, state.authorizer.decide(&request)).await {
        Ok(Ok(decision)) => Json(decision).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(_) => {
            tracing::error!(timeout_secs = timeout.as_secs(), "Grant lookup timed out");
            DecisionError::Fail {
                code: "grant_lookup_failed",
                message: format!("grant lookup timed out after {}s", timeout.as_secs()),
            }
            .into_response()
        }
    }
}
