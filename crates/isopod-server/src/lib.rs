//! Isopod HTTP boot server
//!
//! Serves an opened ISO image over HTTP: directory listings and raw file
//! streams for every path in the image, plus a generated iPXE script at
//! `/boot.ipxe` that points a booting machine at the configured kernel and
//! ramdisks inside the same tree.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use isopod_image::IsoImage;
//! use isopod_ipxe::BootConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let image = IsoImage::open("boot.iso")?;
//!     let boot = BootConfig::new("/vmlinuz", "console=ttyS0")
//!         .with_initrd("/initrd.img,main".parse()?);
//!     isopod_server::run(Arc::new(image), Arc::new(boot), 8080).await
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tokio::signal::unix::{signal, SignalKind};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use isopod_image::FileTree;
use isopod_ipxe::BootConfig;

pub mod handlers;
pub mod network;

pub use network::local_ipv4_addresses;

/// Shared per-request state
#[derive(Clone)]
pub struct AppState {
    /// Image tree every non-boot request is served from
    pub image: Arc<dyn FileTree>,

    /// Static boot configuration behind `/boot.ipxe`
    pub boot: Arc<BootConfig>,
}

/// Build the application router: `/boot.ipxe` plus a fallback that serves
/// every other path out of the image tree.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/boot.ipxe", get(handlers::boot_script))
        .fallback(handlers::serve_path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listening port and serve until Ctrl+C or SIGTERM.
pub async fn run(image: Arc<dyn FileTree>, boot: Arc<BootConfig>, port: u16) -> anyhow::Result<()> {
    let app = router(AppState { image, boot });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!(
        "Listening on http://{}",
        listener.local_addr().context("Failed to get local address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.unwrap_or_else(|e| {
            error!("Failed to listen for Ctrl+C: {}", e);
        });
        info!("Received Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) = signal(SignalKind::terminate()) {
            signal.recv().await;
            info!("Received SIGTERM");
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
