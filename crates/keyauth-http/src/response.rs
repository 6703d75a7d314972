//! JSON error and status responses.

use serde::Serialize;
use tracing::warn;

use crate::body::ResponseBody;

/// JSON error document returned for every failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    /// Machine-readable error code.
    pub code: &'a str,
    /// Human-readable message.
    pub message: &'a str,
    /// Request ID, also sent as `x-request-id`.
    pub request_id: &'a str,
}

/// The response for a request that failed authentication.
///
/// Every rejection produces the same body, whatever the underlying cause, so
/// callers cannot tell an unknown key from a bad signature or a stale
/// timestamp.
#[must_use]
pub fn unauthorized_response(request_id: &str) -> http::Response<ResponseBody> {
    error_response(
        http::StatusCode::UNAUTHORIZED,
        "unauthorized",
        "The request could not be authenticated",
        request_id,
    )
}

/// Build a JSON error response.
#[must_use]
pub fn error_response(
    status: http::StatusCode,
    code: &str,
    message: &str,
    request_id: &str,
) -> http::Response<ResponseBody> {
    let error = ErrorBody {
        code,
        message,
        request_id,
    };
    json_with_status(status, &error)
}

/// Build a `200 OK` JSON response.
///
/// A value that fails to serialize yields an empty `500` instead.
#[must_use]
pub fn json_response<T: Serialize + ?Sized>(value: &T) -> http::Response<ResponseBody> {
    json_with_status(http::StatusCode::OK, value)
}

fn json_with_status<T: Serialize + ?Sized>(
    status: http::StatusCode,
    value: &T,
) -> http::Response<ResponseBody> {
    let body = match ResponseBody::json(value) {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "failed to serialize JSON response");
            return internal_error_response();
        }
    };

    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap_or_else(|_| internal_error_response())
}

fn internal_error_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::INTERNAL_SERVER_ERROR)
        .body(ResponseBody::empty())
        .expect("static response should be valid")
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: http::Response<ResponseBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_should_produce_uniform_unauthorized_response() {
        let resp = unauthorized_response("req-1");
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json"),
        );
        let json = body_json(resp).await;
        assert_eq!(json["code"], "unauthorized");
        assert_eq!(json["requestId"], "req-1");
    }

    #[test]
    fn test_should_return_server_error_when_serialization_fails() {
        let map: std::collections::HashMap<(u8, u8), u8> = [((1, 2), 3)].into();
        let resp = json_response(&map);
        assert_eq!(resp.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(http::header::CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_should_produce_json_ok_response() {
        let resp = json_response(&serde_json::json!({ "principal": "author" }));
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(body_json(resp).await["principal"], "author");
    }
}
