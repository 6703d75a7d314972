//! Integration tests for the KeyAuth server.
//!
//! These tests require a running `keyauth-server` at `localhost:8080` that
//! knows the credential in `API_KEY` / `SHARED_SECRET` (defaulting to
//! `asdf123` / `fdsa4321`, owned by `OWNER_ID`, default `author`).
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! API_KEY=asdf123 SHARED_SECRET=fdsa4321 OWNER_ID=author keyauth-server &
//! cargo test -p keyauth-integration -- --ignored
//! ```

use std::sync::Once;

use anyhow::{Context, Result};
use keyauth::{RequestSigner, SchemaVersion, SharedSecret};

mod test_auth;
mod test_legacy;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("KEYAUTH_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned())
}

/// The API key the server under test knows.
#[must_use]
pub fn api_key() -> String {
    std::env::var("API_KEY").unwrap_or_else(|_| "asdf123".to_owned())
}

/// The principal owning [`api_key`].
#[must_use]
pub fn owner_id() -> String {
    std::env::var("OWNER_ID").unwrap_or_else(|_| "author".to_owned())
}

/// A signer for the configured credential.
#[must_use]
pub fn signer(version: SchemaVersion) -> RequestSigner {
    let secret = std::env::var("SHARED_SECRET").unwrap_or_else(|_| "fdsa4321".to_owned());
    RequestSigner::new(api_key(), SharedSecret::new(secret), version)
}

/// A plain HTTP client.
#[must_use]
pub fn http_client() -> reqwest::Client {
    init_tracing();
    reqwest::Client::new()
}

/// Build a request signed by `signer` as of `timestamp`.
///
/// When `form` is non-empty it is sent as an
/// `application/x-www-form-urlencoded` body and covered by the signature.
pub fn signed_request(
    client: &reqwest::Client,
    signer: &RequestSigner,
    method: reqwest::Method,
    path_and_query: &str,
    form: &[(&str, &str)],
    timestamp: i64,
) -> reqwest::RequestBuilder {
    let pairs: Vec<(String, String)> = form
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    let headers = signer.sign(method.as_str(), path_and_query, &pairs, timestamp);
    tracing::debug!(%method, path_and_query, timestamp, "sending signed request");

    let mut builder = client.request(method, format!("{}{path_and_query}", endpoint_url()));
    for (name, value) in headers.pairs() {
        builder = builder.header(name, value);
    }
    if !form.is_empty() {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        builder = builder
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body);
    }
    builder
}

/// Send a request and return its status code and JSON body.
pub async fn send_json(builder: reqwest::RequestBuilder) -> Result<(u16, serde_json::Value)> {
    let response = builder.send().await.context("request failed")?;
    let status = response.status().as_u16();
    let json = response
        .json::<serde_json::Value>()
        .await
        .context("response is not JSON")?;
    Ok((status, json))
}

/// Current Unix time in seconds.
#[must_use]
pub fn now() -> i64 {
    keyauth::replay::now_unix()
}
