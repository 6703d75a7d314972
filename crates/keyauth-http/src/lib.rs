//! Hyper service that authenticates signed requests.
//!
//! This crate puts the [`keyauth`] verifier in front of an application
//! handler:
//!
//! - **Service** ([`service`]): [`KeyAuthService`](service::KeyAuthService)
//!   implements hyper's `Service` trait, collects the body, runs the
//!   authentication pipeline, and dispatches to the handler.
//!
//! - **Handler** ([`handler`]): the [`KeyAuthHandler`](handler::KeyAuthHandler)
//!   trait that receives the authenticated principal.
//!
//! - **Response** ([`response`]): JSON error documents, including the uniform
//!   401 returned for every authentication failure.
//!
//! - **Body** ([`body`]): the [`ResponseBody`](body::ResponseBody) type.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> KeyAuthService (hyper Service)
//!     -> Health check interception
//!     -> Body collection
//!     -> AuthPipeline (KeyAuthVerifier, ...)
//!     -> KeyAuthHandler
//!     -> Common response headers (x-request-id, Server)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use keyauth_http::handler::WhoAmIHandler;
//! use keyauth_http::service::{KeyAuthHttpConfig, KeyAuthService};
//!
//! let service = KeyAuthService::new(WhoAmIHandler, KeyAuthHttpConfig::default());
//! // Use `service` with hyper server.
//! ```

pub mod body;
pub mod handler;
pub mod response;
pub mod service;

pub use body::ResponseBody;
pub use handler::{HandlerFuture, KeyAuthHandler, WhoAmIHandler};
pub use service::{KeyAuthHttpConfig, KeyAuthService};
