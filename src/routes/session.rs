use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use serde_json::json;

use crate::auth::{SessionExpiry, SessionStatus, introspect_session};

/// Seconds until the presented access token expires.
///
/// No signature check: the answer only drives client-side refresh.
#[tracing::instrument(name = "routes.session", skip_all)]
pub async fn session_expiry(headers: HeaderMap) -> Response {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let status = introspect_session(header);
    let code = StatusCode::from_u16(status.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match status {
        SessionStatus::Active { expires_in } => (
            code,
            Json(SessionExpiry {
                access_token_expires_in: expires_in,
            }),
        )
            .into_response(),
        SessionStatus::Expired => (code, Json(json!({ "message": "Token expired" }))).into_response(),
        SessionStatus::Undecodable(detail) => {
            tracing::debug!(error = %detail, "Session token could not be decoded");
            (code, Json(json!({ "message": detail }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use chrono::Utc;
    use http::Request;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;
    use crate::routes::test_support::{app, send};

    fn bearer(exp_offset: i64) -> String {
        let exp = Utc::now().timestamp() + exp_offset;
        let token = encode(
            &Header::default(),
            &json!({ "sub": "u1", "exp": exp }),
            &EncodingKey::from_secret(b"unrelated"),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    fn get(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::get("/session").header("origin", "https://app.example.com");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_active_session() {
        let (status, headers, body) = send(app(""), get(Some(&bearer(600)))).await;

        assert_eq!(status, StatusCode::OK);
        let left = body["access_token_expires_in"].as_i64().unwrap();
        assert!((595..=600).contains(&left));
        assert_eq!(headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_expired_session() {
        let (status, _, body) = send(app(""), get(Some(&bearer(-60)))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "message": "Token expired" }));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (status, _, body) = send(app(""), get(None)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["message"],
            "Malformed authorization header: missing authorization header"
        );
    }

    #[tokio::test]
    async fn test_undecodable_token() {
        let (status, _, body) = send(app(""), get(Some("Bearer not.a.jwt"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error in getting accessToken Expiry date");
    }

    #[tokio::test]
    async fn test_cors_can_be_disabled() {
        let (status, headers, _) = send(app("[server]\ncors = false\n"), get(Some(&bearer(600)))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("access-control-allow-origin"));
    }
}
