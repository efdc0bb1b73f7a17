//! MCP server runners for promql-mcp.
//!
//! Exactly one transport serves a process. Both implement [`Servable`] and
//! stop when the shared shutdown token is cancelled; [`run_until_shutdown`]
//! cancels that token on SIGINT or SIGTERM.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::PromqlMcp;

pub const DEFAULT_MCP_HTTP_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 8080);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum ServeError {
    Bind { addr: SocketAddr, source: io::Error },
    Initialize(String),
    Io(io::Error),
    Join(JoinError),
    ShutdownTimeout(Duration),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "failed to bind {addr}: {source}"),
            Self::Initialize(message) => write!(f, "failed to initialize MCP session: {message}"),
            Self::Io(err) => write!(f, "transport error: {err}"),
            Self::Join(err) => write!(f, "transport task failed: {err}"),
            Self::ShutdownTimeout(grace) => {
                write!(f, "graceful shutdown did not finish within {grace:?}")
            }
        }
    }
}

impl Error for ServeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            Self::Join(err) => Some(err),
            Self::Initialize(_) | Self::ShutdownTimeout(_) => None,
        }
    }
}

/// A transport that serves MCP requests until `shutdown` is cancelled.
pub trait Servable {
    /// Short transport name used in logs.
    fn transport(&self) -> &'static str;

    /// Serves until the peer goes away or `shutdown` is cancelled.
    ///
    /// # Errors
    /// Returns a [`ServeError`] when the transport cannot start or fails
    /// while serving.
    fn serve(
        self,
        shutdown: CancellationToken,
    ) -> impl Future<Output = Result<(), ServeError>> + Send;
}

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
    pub shutdown_grace: Duration,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }

    #[must_use]
    pub const fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MCP_HTTP_ADDR)
    }
}

/// Serves the MCP server over stdin/stdout.
pub struct StdioTransport {
    service: PromqlMcp,
}

impl StdioTransport {
    #[must_use]
    pub const fn new(service: PromqlMcp) -> Self {
        Self { service }
    }
}

impl Servable for StdioTransport {
    fn transport(&self) -> &'static str {
        "stdio"
    }

    async fn serve(self, shutdown: CancellationToken) -> Result<(), ServeError> {
        let running = tokio::select! {
            running = serve_server(self.service, stdio()) => {
                running.map_err(|err| ServeError::Initialize(err.to_string()))?
            }
            () = shutdown.cancelled() => return Ok(()),
        };

        // Dropping the running service cancels its session loop.
        tokio::select! {
            quit = running.waiting() => {
                let reason = quit.map_err(ServeError::Join)?;
                debug!(?reason, "stdio session ended");
            }
            () = shutdown.cancelled() => {
                info!("stdio transport shutting down");
            }
        }
        Ok(())
    }
}

/// Serves the MCP server using the streamable HTTP transport at `/mcp`.
pub struct HttpTransport {
    service: PromqlMcp,
    config: McpHttpServerConfig,
}

impl HttpTransport {
    #[must_use]
    pub const fn new(service: PromqlMcp, config: McpHttpServerConfig) -> Self {
        Self { service, config }
    }

    fn router(&self) -> Router {
        let service = self.service.clone();
        let mcp: StreamableHttpService<PromqlMcp, LocalSessionManager> = StreamableHttpService::new(
            move || Ok(service.clone()),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: self.config.sse_keep_alive,
                sse_retry: self.config.sse_retry,
                stateful_mode: self.config.stateful_mode,
                ..Default::default()
            },
        );

        Router::new()
            .route("/health", get(|| async { "ok" }))
            .nest_service("/mcp", mcp)
    }
}

impl Servable for HttpTransport {
    fn transport(&self) -> &'static str {
        "streamable-http"
    }

    async fn serve(self, shutdown: CancellationToken) -> Result<(), ServeError> {
        let app = self.router();
        let addr = self.config.addr;
        let grace = self.config.shutdown_grace;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        info!(%addr, "streamable HTTP transport listening on /mcp");

        let graceful = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { graceful.cancelled().await })
                .await
        });

        tokio::select! {
            joined = &mut server => return flatten(joined),
            () = shutdown.cancelled() => {}
        }

        if let Ok(joined) = tokio::time::timeout(grace, &mut server).await {
            flatten(joined)
        } else {
            let err = ServeError::ShutdownTimeout(grace);
            warn!(error = %err, "aborting streamable HTTP transport");
            server.abort();
            Ok(())
        }
    }
}

fn flatten(joined: Result<io::Result<()>, JoinError>) -> Result<(), ServeError> {
    joined.map_err(ServeError::Join)?.map_err(ServeError::Io)
}

/// Runs `servable` until it finishes or a termination signal arrives.
///
/// The shutdown token is cancelled on SIGINT/SIGTERM and again once the
/// transport returns, so anything else watching it stops as well.
///
/// # Errors
/// Returns the transport's error when serving fails.
pub async fn run_until_shutdown<S>(
    servable: S,
    shutdown: CancellationToken,
) -> Result<(), ServeError>
where
    S: Servable,
{
    let watcher = tokio::spawn(watch_signals(shutdown.clone()));
    info!(transport = servable.transport(), "starting PromQL MCP server");

    let result = servable.serve(shutdown.clone()).await;
    shutdown.cancel();
    watcher.abort();

    match &result {
        Ok(()) => info!("PromQL MCP server stopped"),
        Err(err) => error!(error = %err, "PromQL MCP server failed"),
    }
    result
}

async fn watch_signals(shutdown: CancellationToken) {
    tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
        () = shutdown.cancelled() => {}
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTransport {
        fail: bool,
    }

    impl Servable for FakeTransport {
        fn transport(&self) -> &'static str {
            "fake"
        }

        async fn serve(self, shutdown: CancellationToken) -> Result<(), ServeError> {
            if self.fail {
                return Err(ServeError::Initialize("peer hung up".to_string()));
            }
            shutdown.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn returns_once_shutdown_is_cancelled() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_until_shutdown(FakeTransport { fail: false }, shutdown),
        )
        .await
        .expect("supervisor should stop after cancellation");

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn transport_failure_propagates_and_cancels_token() {
        let shutdown = CancellationToken::new();

        let result = run_until_shutdown(FakeTransport { fail: true }, shutdown.clone()).await;

        assert!(matches!(result, Err(ServeError::Initialize(_))));
        assert!(shutdown.is_cancelled());
    }

    #[test]
    fn default_http_config_binds_locally() {
        let config = McpHttpServerConfig::default();

        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert!(config.stateful_mode);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }
}
