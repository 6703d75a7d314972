//! KeyAuth Server - answers signed requests with the authenticated principal.
//!
//! This binary puts the `keyauth-http` service in front of a small handler
//! that reports who the caller is. It is useful for checking client signing
//! code against a real verifier.
//!
//! # Usage
//!
//! ```text
//! KEYAUTH_CREDENTIALS_FILE=credentials.json keyauth-server
//! keyauth-server --generate-key alice >> credentials.json
//! keyauth-server --health-check
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `KEYAUTH_REPLAY_WINDOW_SECS` | `300` | Accepted timestamp skew |
//! | `KEYAUTH_ALLOW_LEGACY` | `true` | Accept unversioned (v0) signatures |
//! | `KEYAUTH_STRIP_SLASHES` | `false` | Unquote backslash-escaped form values |
//! | `KEYAUTH_REQUIRE_AUTH` | `true` | Refuse unsigned requests |
//! | `KEYAUTH_CREDENTIALS_FILE` | *(unset)* | JSON array of credentials |
//! | `API_KEY` / `SHARED_SECRET` / `OWNER_ID` | *(unset)* | A single credential |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use keyauth::{
    AuthPipeline, Credential, KeyAuthConfig, KeyAuthVerifier, KeyPair, PrincipalId,
    SharedSecret, StaticCredentialStore,
};
use keyauth_http::service::HEALTH_PATH;
use keyauth_http::{KeyAuthHandler, KeyAuthHttpConfig, KeyAuthService, WhoAmIHandler};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Load the credential store.
///
/// Credentials come from `KEYAUTH_CREDENTIALS_FILE` when set, plus a single
/// credential from `API_KEY` / `SHARED_SECRET` / `OWNER_ID` when all three
/// are present.
fn build_credential_store(config: &KeyAuthConfig) -> Result<StaticCredentialStore> {
    let mut store = match config.credentials_file.as_deref() {
        Some(path) => load_credentials_file(path)?,
        None => StaticCredentialStore::default(),
    };

    if let Some(credential) = credential_from_env() {
        info!(api_key = %credential.api_key, "configured credential from environment");
        store.insert(credential);
    }

    if store.is_empty() {
        warn!("no credentials configured, every signed request will be rejected");
    }

    Ok(store)
}

fn load_credentials_file(path: &str) -> Result<StaticCredentialStore> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read credentials file {path}"))?;
    let store = StaticCredentialStore::from_json(&json)
        .with_context(|| format!("invalid credentials file {path}"))?;
    info!(path, credentials = store.len(), "loaded credentials file");
    Ok(store)
}

fn credential_from_env() -> Option<Credential> {
    Some(Credential {
        api_key: std::env::var("API_KEY").ok()?,
        shared_secret: SharedSecret::new(std::env::var("SHARED_SECRET").ok()?),
        owner_id: PrincipalId::new(std::env::var("OWNER_ID").ok()?),
    })
}

/// Build the [`KeyAuthHttpConfig`] from the application [`KeyAuthConfig`].
fn build_http_config(config: &KeyAuthConfig, store: StaticCredentialStore) -> KeyAuthHttpConfig {
    let verifier = KeyAuthVerifier::new(config.policy(), Arc::new(store));
    KeyAuthHttpConfig {
        require_auth: config.require_auth,
        pipeline: AuthPipeline::new().with(Arc::new(verifier)),
    }
}

/// Generate a fresh credential for `owner` as a JSON line.
fn generate_credential(owner: &str) -> Result<String> {
    let credential = KeyPair::generate().into_credential(PrincipalId::new(owner));
    serde_json::to_string(&credential).context("cannot serialize credential")
}

/// Accept connections until `shutdown` resolves, then drain in-flight requests.
async fn serve<H, F>(listener: TcpListener, service: KeyAuthService<H>, shutdown: F) -> Result<()>
where
    H: KeyAuthHandler,
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    let builder = HttpConnBuilder::new(TokioExecutor::new());
    tokio::pin!(shutdown);

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };
        debug!(%peer_addr, "accepted connection");

        let conn = builder.serve_connection(TokioIo::new(stream), service.clone());
        let conn = graceful.watch(conn.into_owned());
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!(%peer_addr, error = %e, "connection error");
            }
        });
    }

    info!("draining connections");
    graceful.shutdown().await;
    info!("all connections drained, exiting");
    Ok(())
}

/// Resolve once Ctrl-C is received.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

/// Check the health endpoint at `addr` over plain HTTP/1.1.
async fn run_health_check(addr: &str) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let request = format!("GET {HEALTH_PATH} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    let response = String::from_utf8_lossy(&raw);

    let status_ok = response
        .lines()
        .next()
        .is_some_and(|line| line.split_whitespace().nth(1) == Some("200"));
    anyhow::ensure!(
        status_ok && response.contains(r#""status":"running""#),
        "unhealthy response from {addr}"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Handle --health-check flag for Docker HEALTHCHECK.
    if args.iter().any(|a| a == "--health-check") {
        let config = KeyAuthConfig::from_env();
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    if let Some(pos) = args.iter().position(|a| a == "--generate-key") {
        let owner = args
            .get(pos + 1)
            .context("--generate-key requires an owner id")?;
        println!("{}", generate_credential(owner)?);
        return Ok(());
    }

    let config = KeyAuthConfig::from_env();

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        replay_window_secs = config.replay_window_secs,
        allow_legacy = config.allow_legacy,
        strip_slashes = config.strip_slashes,
        require_auth = config.require_auth,
        version = VERSION,
        "starting KeyAuth Server",
    );

    let store = build_credential_store(&config)?;
    let http_config = build_http_config(&config, store);
    let service = KeyAuthService::new(WhoAmIHandler, http_config);

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service, ctrl_c()).await
}
