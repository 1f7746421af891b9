//! HTTP server wiring for stashbin (routes, shared state, background reaping).

/// Client identity extraction for rate limiting.
pub mod client;
/// HTTP error mapping for handlers.
pub mod error;
/// HTTP handlers for the JSON API, the curl form and the website.
pub mod handlers;
/// Periodic expiry sweep.
pub mod reaper;

pub use stashbin_core::{
    config, db, models, AppError, Area, Config, Database, PasteService, PlainRenderer,
    RateLimiter, DEFAULT_PORT,
};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: PasteService,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Construct shared application state over an open database.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `db`: Open database handle.
    ///
    /// # Returns
    /// A new [`AppState`] with a fresh rate limiter.
    pub fn new(config: Config, db: Database) -> Self {
        let config = Arc::new(config);
        let service = PasteService::new(Arc::new(db), config.clone(), Arc::new(PlainRenderer));
        let limiter = Arc::new(RateLimiter::new(config.ratelimit.clone()));
        Self {
            service,
            limiter,
            config,
        }
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
///
/// # Returns
/// Configured `axum::Router`.
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.paste_size.saturating_mul(2);

    Router::new()
        // JSON API
        .route("/api/v1/paste", post(handlers::api::create_paste))
        .route("/api/v1/paste/:slug", get(handlers::api::get_paste))
        .route("/api/v1/lexer", get(handlers::api::list_lexers))
        .route("/api/v1/expiry", get(handlers::api::list_expiries))
        // curl form
        .route("/curl", post(handlers::curl::create_paste))
        // Website
        .route("/", get(handlers::website::index))
        .route("/create", post(handlers::website::create_paste))
        .route("/repaste/:slug", get(handlers::website::repaste))
        .route("/raw/:slug", get(handlers::website::raw_file))
        .route("/hex/:slug", get(handlers::website::hex_file))
        .route("/download/:slug", get(handlers::website::download_file))
        .route("/remove/:token", get(handlers::website::remove_paste))
        .route("/:slug", get(handlers::website::show_paste))
        .route("/:slug/raw", get(handlers::website::raw_file))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static(CONTENT_SECURITY_POLICY),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
}

/// Resolve the listener address from the configured host and port.
///
/// # Arguments
/// - `config`: Server configuration.
/// - `port_override`: Port given on the command line, if any.
///
/// # Returns
/// The socket address to bind; an unparsable host falls back to loopback.
pub fn resolve_bind_address(config: &Config, port_override: Option<u16>) -> SocketAddr {
    let port = port_override.unwrap_or(config.port);
    let ip = match config.host.trim().parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(err) => {
            tracing::warn!(
                "Invalid host '{}': {}. Falling back to 127.0.0.1",
                config.host,
                err
            );
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    };
    SocketAddr::new(ip, port)
}

/// Run the Axum server with graceful shutdown support.
///
/// Peer addresses are attached to every request so rate limiting can fall
/// back to the socket address.
///
/// # Arguments
/// - `listener`: Bound TCP listener for the server.
/// - `state`: Shared application state.
/// - `shutdown_signal`: Future that resolves when shutdown should start.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = create_app(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
}
