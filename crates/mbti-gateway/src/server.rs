use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mbti_core::{SessionRegistry, TurnOrchestrator};
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

#[derive(Clone)]
pub(crate) struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sessions: Arc<SessionRegistry>,
    pub started_at: Instant,
}

impl AppState {
    pub(crate) fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(SessionRegistry::new()),
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    session_idle: Duration,
    orchestrator: Arc<TurnOrchestrator>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAddress`] if `bind:port` is not a socket address.
    pub fn new(
        bind: &str,
        port: u16,
        orchestrator: Arc<TurnOrchestrator>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, GatewayError> {
        let raw = format!("{bind}:{port}");
        let addr: SocketAddr = raw
            .parse()
            .map_err(|source| GatewayError::InvalidAddress { addr: raw, source })?;

        if addr.ip().is_unspecified() {
            tracing::warn!("gateway binding to {addr}, reachable from other hosts");
        }

        Ok(Self {
            addr,
            max_body_size: 64 * 1024,
            session_idle: Duration::from_secs(30 * 60),
            orchestrator,
            shutdown_rx,
        })
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Sessions untouched for `idle` are evicted by a background sweep.
    #[must_use]
    pub fn with_session_idle_timeout(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the shutdown flag flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState::new(self.orchestrator);
        let sweeper = tokio::spawn(sweep_idle_sessions(
            Arc::clone(&state.sessions),
            self.session_idle,
            self.shutdown_rx.clone(),
        ));
        let router = build_router(state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr, e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let shutdown_rx = self.shutdown_rx;
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_requested(shutdown_rx).await;
                tracing::info!("gateway shutting down");
            })
            .await;
        sweeper.abort();
        served?;

        Ok(())
    }
}

/// Resolves once the flag is `true`. Never resolves if the sender goes away first.
async fn shutdown_requested(mut shutdown_rx: watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Periodically evict sessions idle for `max_idle` until shutdown.
pub(crate) async fn sweep_idle_sessions(
    sessions: Arc<SessionRegistry>,
    max_idle: Duration,
    shutdown_rx: watch::Receiver<bool>,
) {
    let period = (max_idle / 2)
        .min(Duration::from_secs(60))
        .max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = shutdown_requested(shutdown_rx);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                let evicted = sessions.evict_idle(max_idle).await;
                if evicted > 0 {
                    let remaining = sessions.len().await;
                    tracing::info!(evicted, remaining, "evicted idle sessions");
                }
            }
        }
    }
}
