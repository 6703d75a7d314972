//! The boundary between authentication and application logic.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use keyauth::PrincipalId;
use serde::Serialize;

use crate::body::ResponseBody;
use crate::response::json_response;

/// Boxed future returned by [`KeyAuthHandler::handle`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = http::Response<ResponseBody>> + Send>>;

/// Application logic that runs after authentication.
///
/// The handler receives the request parts, the collected body, and the
/// authenticated principal. The principal is `None` only when the service is
/// configured not to require authentication and nobody authenticated the
/// request.
pub trait KeyAuthHandler: Send + Sync + 'static {
    /// Produce the response for an authenticated request.
    fn handle(
        &self,
        parts: http::request::Parts,
        body: Bytes,
        principal: Option<PrincipalId>,
    ) -> HandlerFuture;
}

/// Reports who the caller authenticated as.
#[derive(Debug, Clone, Default)]
pub struct WhoAmIHandler;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoAmI {
    principal: Option<PrincipalId>,
    method: String,
    path: String,
}

impl KeyAuthHandler for WhoAmIHandler {
    fn handle(
        &self,
        parts: http::request::Parts,
        _body: Bytes,
        principal: Option<PrincipalId>,
    ) -> HandlerFuture {
        let doc = WhoAmI {
            principal,
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
        };
        Box::pin(async move { json_response(&doc) })
    }
}
