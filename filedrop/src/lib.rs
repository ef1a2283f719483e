//! # filedrop: streaming file upload and download service
//!
//! `filedrop` stores files under caller-chosen names and serves them back. It exists mostly as a
//! benchmark target: the same HTTP surface is implemented on top of [axum] and, behind the
//! `actix` feature, [actix-web], so the two frameworks can be compared under identical load.
//!
//! ## Request Flow
//!
//! `POST /upload/{filename}` validates the name, then streams the body (raw, or the `file` field
//! of a multipart form) chunk by chunk into a temporary file in the upload directory. The size
//! cap is enforced as bytes arrive. Once the body is complete the temporary file is renamed over
//! the target, so concurrent downloads see either the old or the new contents, never a mix.
//!
//! `GET /download/{filename}` opens the stored file and streams it back with a fixed read buffer,
//! as `application/octet-stream` with a `Content-Disposition: attachment` header.
//!
//! ### Core Components
//!
//! - [`storage`]: file name validation and the on-disk store
//! - [`api`]: axum handlers and the response models shared by both bindings
//! - [`actix`]: the actix-web binding of the same routes
//! - [`config`]: YAML + environment configuration
//! - [`telemetry`]: tracing setup with optional OTLP export
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use filedrop::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = filedrop::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     filedrop::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! [axum]: https://github.com/tokio-rs/axum
//! [actix-web]: https://actix.rs
#[cfg(feature = "actix")]
pub mod actix;
pub mod api;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;

pub use config::Config;
use config::Framework;
use openapi::ApiDoc;
use storage::LocalFileStorage;

/// Shared state handed to every request handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .storage(Arc::new(storage))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<LocalFileStorage>,
}

/// Build the axum router with all routes and the request tracing layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/upload/{filename}",
            // Size cap is enforced by the storage layer while streaming
            post(api::handlers::files::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/download/{filename}", get(api::handlers::files::download_file))
        .route("/healthz", get(api::handlers::files::health))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The service: shared state plus the axum router, ready to serve with either framework.
pub struct Application {
    router: Router,
    app_state: AppState,
}

impl Application {
    /// Create the upload directory and wire up the application state.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting filedrop with configuration: {:#?}", config);

        let storage = LocalFileStorage::from_config(&config.files);
        storage.ensure_dir().await?;
        info!("Storing uploads in {}", storage.base_path().display());

        let app_state = AppState::builder().config(config).storage(Arc::new(storage)).build();
        let router = build_router(app_state.clone());

        Ok(Self { router, app_state })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving with the configured framework until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = self.app_state.config.clone();

        match config.framework {
            Framework::Axum => {
                let bind_addr = config.bind_address();
                let listener = TcpListener::bind(&bind_addr).await?;
                info!(
                    "filedrop (axum) listening on http://{}, available at http://localhost:{}",
                    bind_addr, config.port
                );

                axum::serve(listener, self.router.into_make_service())
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
            #[cfg(feature = "actix")]
            Framework::Actix => actix::serve(self.app_state, shutdown).await?,
            #[cfg(not(feature = "actix"))]
            Framework::Actix => anyhow::bail!("filedrop was built without the 'actix' feature"),
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
