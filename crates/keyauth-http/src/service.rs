//! The authenticating HTTP service implementing hyper's `Service` trait.
//!
//! [`KeyAuthService`] sits in front of a [`KeyAuthHandler`]. For each request it:
//!
//! 1. Answers `GET /_health` without authentication
//! 2. Collects the request body
//! 3. Runs the [`AuthPipeline`]
//! 4. Refuses rejected requests (and unauthenticated ones when required) with a uniform 401
//! 5. Hands the request and principal to the handler
//! 6. Adds `x-request-id` and `Server` response headers

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::service::Service;
use keyauth::{AuthOutcome, AuthPipeline};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::body::ResponseBody;
use crate::handler::KeyAuthHandler;
use crate::response::{error_response, unauthorized_response};

/// Health check path, served without authentication.
pub const HEALTH_PATH: &str = "/_health";

/// Configuration for the authenticating service.
#[derive(Clone)]
pub struct KeyAuthHttpConfig {
    /// Refuse requests that no authenticator vouched for.
    pub require_auth: bool,
    /// Authenticators to run on every request.
    pub pipeline: AuthPipeline,
}

impl fmt::Debug for KeyAuthHttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAuthHttpConfig")
            .field("require_auth", &self.require_auth)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Default for KeyAuthHttpConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            pipeline: AuthPipeline::new(),
        }
    }
}

/// Hyper service that authenticates requests before dispatching them.
///
/// # Type Parameters
///
/// - `H`: The application handler implementing [`KeyAuthHandler`].
#[derive(Debug)]
pub struct KeyAuthService<H: KeyAuthHandler> {
    handler: Arc<H>,
    config: Arc<KeyAuthHttpConfig>,
}

impl<H: KeyAuthHandler> KeyAuthService<H> {
    /// Create a service with the given handler and configuration.
    #[must_use]
    pub fn new(handler: H, config: KeyAuthHttpConfig) -> Self {
        Self::from_shared(Arc::new(handler), config)
    }

    /// Create a service from an `Arc<H>` handler and configuration.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, config: KeyAuthHttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }
}

impl<H: KeyAuthHandler> Clone for KeyAuthService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H, B> Service<http::Request<B>> for KeyAuthService<H>
where
    H: KeyAuthHandler,
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: fmt::Display + Send,
{
    type Response = http::Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = process_request(req, handler.as_ref(), &config, &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &H,
    config: &KeyAuthHttpConfig,
    request_id: &str,
) -> http::Response<ResponseBody>
where
    H: KeyAuthHandler,
    B: http_body::Body,
    B::Error: fmt::Display,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing request");

    if is_health_check(&method, uri.path()) {
        return health_check_response();
    }

    let (parts, incoming) = req.into_parts();
    let body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, request_id, "failed to collect request body");
            return error_response(
                http::StatusCode::BAD_REQUEST,
                "bad_request",
                "Failed to read request body",
                request_id,
            );
        }
    };

    let principal = match config.pipeline.run(&parts, &body) {
        AuthOutcome::Authenticated(principal) => Some(principal),
        AuthOutcome::NoOpinion if !config.require_auth => None,
        AuthOutcome::NoOpinion => {
            info!(%method, %uri, request_id, "unauthenticated request refused");
            return unauthorized_response(request_id);
        }
        AuthOutcome::Rejected => {
            info!(%method, %uri, request_id, "authentication rejected");
            return unauthorized_response(request_id);
        }
    };

    debug!(principal = ?principal, request_id, "dispatching request");
    handler.handle(parts, body, principal).await
}

async fn collect_body<B: http_body::Body>(body: B) -> Result<Bytes, B::Error> {
    let collected = body.collect().await?;
    Ok(collected.to_bytes())
}

fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == HEALTH_PATH
}

fn health_check_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(ResponseBody::from_bytes(
            r#"{"status":"running","service":"keyauth"}"#,
        ))
        .expect("static health response should be valid")
}

fn add_common_headers(
    mut response: http::Response<ResponseBody>,
    request_id: &str,
) -> http::Response<ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", hv);
    }
    headers.insert(
        http::header::SERVER,
        http::header::HeaderValue::from_static("keyauth"),
    );
    response
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use keyauth::{
        Credential, KeyAuthVerifier, PrincipalId, RequestSigner, SchemaVersion, SharedSecret,
        StaticCredentialStore, VerifierPolicy,
    };

    use super::*;
    use crate::handler::WhoAmIHandler;

    fn pipeline() -> AuthPipeline {
        let store = StaticCredentialStore::new(vec![Credential {
            api_key: "asdf123".to_owned(),
            shared_secret: SharedSecret::new("fdsa4321"),
            owner_id: PrincipalId::new("author"),
        }]);
        AuthPipeline::new().with(Arc::new(KeyAuthVerifier::new(
            VerifierPolicy::default(),
            Arc::new(store),
        )))
    }

    fn service(require_auth: bool) -> KeyAuthService<WhoAmIHandler> {
        KeyAuthService::new(
            WhoAmIHandler,
            KeyAuthHttpConfig {
                require_auth,
                pipeline: pipeline(),
            },
        )
    }

    fn signer() -> RequestSigner {
        RequestSigner::new("asdf123", SharedSecret::new("fdsa4321"), SchemaVersion::V1)
    }

    fn form_request(
        uri: &str,
        body: &'static str,
        signed_pairs: &[(String, String)],
    ) -> http::Request<Full<Bytes>> {
        let mut req = http::Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        signer()
            .sign_now("POST", uri, signed_pairs)
            .apply(req.headers_mut())
            .unwrap();
        req
    }

    async fn json_of(resp: http::Response<ResponseBody>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_should_pass_principal_to_handler() {
        let mut req = http::Request::builder()
            .uri("/wp-json/wp/v2/users/me")
            .body(Full::new(Bytes::new()))
            .unwrap();
        signer()
            .sign_now("GET", "/wp-json/wp/v2/users/me", &[])
            .apply(req.headers_mut())
            .unwrap();

        let resp = service(true).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
        assert_eq!(json_of(resp).await["principal"], "author");
    }

    #[tokio::test]
    async fn test_should_cover_form_body_with_signature() {
        let pairs = vec![
            ("title".to_owned(), "Hello World".to_owned()),
            ("status".to_owned(), "draft".to_owned()),
        ];
        let req = form_request("/posts", "title=Hello+World&status=draft", &pairs);
        let resp = service(true).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_reject_tampered_form_body() {
        let pairs = vec![("title".to_owned(), "Hello".to_owned())];
        let req = form_request("/posts", "title=Goodbye", &pairs);
        let resp = service(true).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_return_uniform_rejection_body() {
        let mut bad_signature = form_request("/posts", "", &[]);
        bad_signature.headers_mut().insert(
            "x-api-signature",
            http::header::HeaderValue::from_static("00"),
        );
        let mut unknown_key = form_request("/posts", "", &[]);
        unknown_key.headers_mut().insert(
            "x-api-key",
            http::header::HeaderValue::from_static("nobody"),
        );

        let svc = service(true);
        let a = json_of(svc.call(bad_signature).await.unwrap()).await;
        let b = json_of(svc.call(unknown_key).await.unwrap()).await;
        assert_eq!(a["code"], b["code"]);
        assert_eq!(a["message"], b["message"]);
    }

    #[tokio::test]
    async fn test_should_refuse_unsigned_request_when_required() {
        let req = http::Request::builder()
            .uri("/me")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = service(true).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_should_allow_anonymous_request_when_optional() {
        let req = http::Request::builder()
            .uri("/me")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = service(false).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert!(json_of(resp).await["principal"].is_null());
    }

    #[tokio::test]
    async fn test_should_still_reject_bad_signature_when_optional() {
        let mut req = form_request("/posts", "", &[]);
        req.headers_mut().insert(
            "x-api-signature",
            http::header::HeaderValue::from_static("00"),
        );
        let resp = service(false).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_serve_health_without_auth() {
        let req = http::Request::builder()
            .uri(HEALTH_PATH)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = service(true).call(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(json_of(resp).await["status"], "running");
    }

    #[test]
    fn test_should_detect_health_check_paths() {
        assert!(is_health_check(&http::Method::GET, "/_health"));
        assert!(!is_health_check(&http::Method::POST, "/_health"));
        assert!(!is_health_check(&http::Method::GET, "/health"));
    }

    #[test]
    fn test_should_add_common_headers() {
        let resp = http::Response::builder()
            .body(ResponseBody::empty())
            .unwrap();
        let resp = add_common_headers(resp, "test-request-id");
        assert_eq!(
            resp.headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok()),
            Some("test-request-id"),
        );
        assert_eq!(
            resp.headers()
                .get(http::header::SERVER)
                .and_then(|v| v.to_str().ok()),
            Some("keyauth"),
        );
    }

    #[test]
    fn test_should_debug_format_config() {
        let config = KeyAuthHttpConfig {
            require_auth: false,
            pipeline: pipeline(),
        };
        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("KeyAuthHttpConfig"));
        assert!(debug_str.contains("key-auth"));
    }
}
