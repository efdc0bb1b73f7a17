//! Daemon entry point for the PromQL MCP server.
//!
//! Loads configuration from flags and the environment, sets up logging, and
//! serves the MCP protocol over stdio or streamable HTTP until a termination
//! signal arrives.

mod config;
mod logging;

use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;

use promql_core::PrometheusClient;
use promql_mcp::PromqlMcp;
use promql_mcp::server::{
    HttpTransport,
    McpHttpServerConfig,
    StdioTransport,
    run_until_shutdown,
};
use promql_mcp::tools::series::SeriesLookup;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span};

use crate::config::McpdConfig;
use crate::logging::init_logging;

/// Bounds how long blocking tasks (such as the stdin reader) may hold up exit.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let config = match McpdConfig::from_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("promql-mcpd: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(config.log_level) {
        eprintln!("promql-mcpd: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "promql-mcpd exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: McpdConfig) -> Result<(), Box<dyn Error>> {
    info!(
        api_url = %config.api_url,
        log_level = %config.log_level,
        stdio = config.enable_stdio,
        "starting promql-mcpd"
    );

    let client = PrometheusClient::new(&config.api_url)?
        .with_span(info_span!("prometheus_client", api_url = %config.api_url));
    let series = SeriesLookup::new(client).with_span(info_span!("series_lookup"));
    let service = PromqlMcp::with_lookup(series);
    let shutdown = CancellationToken::new();

    if config.enable_stdio {
        run_until_shutdown(StdioTransport::new(service), shutdown).await?;
    } else {
        let http = McpHttpServerConfig::new(config.mcp_http_addr);
        run_until_shutdown(HttpTransport::new(service, http), shutdown).await?;
    }
    Ok(())
}
