use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use backend_application::AppState;
use backend_interfaces_http::build_router;

use crate::context::AppContext;

/// A relay serving on a background task, stopped through [`RelayHandle::stop`].
pub struct RelayHandle {
    pub local_addr: SocketAddr,
    pub state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker: JoinHandle<Result<()>>,
}

impl RelayHandle {
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.worker.await?
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("ignoring cors origin {}: {}", origin, err);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn build_router_with_layers(state: AppState) -> Router {
    build_router(state.clone())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(RequestBodyLimitLayer::new(
            usize::try_from(state.config.max_body_bytes).unwrap_or(usize::MAX),
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_seconds,
        )))
        .layer(TraceLayer::new_for_http())
}

/// Runs the relay loop, the expiry watcher and the HTTP server until
/// `shutdown` resolves.
pub async fn serve(
    state: AppState,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let relay = state.gateway.start();
    let watcher = Arc::new(state.expiry_watcher()).spawn();

    let app = build_router_with_layers(state);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    relay.abort();
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    info!("relay stopped");
    Ok(result?)
}

pub async fn run_standalone(context: AppContext) -> Result<()> {
    let state = context.state;
    let addr: SocketAddr = state.config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    serve(state, listener, shutdown_signal()).await
}

/// Serves on an already bound listener from a background task.
pub fn spawn_relay(state: AppState, listener: TcpListener) -> Result<RelayHandle> {
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let worker = tokio::spawn(serve(state.clone(), listener, async move {
        let _ = shutdown_rx.await;
    }));
    info!("relay listening on {}", local_addr);

    Ok(RelayHandle {
        local_addr,
        state,
        shutdown_tx: Some(shutdown_tx),
        worker,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
