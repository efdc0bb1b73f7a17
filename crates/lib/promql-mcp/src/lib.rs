//! MCP server implementation for promql-mcp.
//!
//! This crate wires the Prometheus-compatible API client into rmcp tool and
//! prompt handlers and provides the stdio and streamable HTTP transports the
//! daemon chooses between.

mod helpers;
pub mod prompts;
pub mod server;
pub mod tools;

use promql_core::PrometheusClient;
use rmcp::{
    RoleServer,
    ServerHandler,
    handler::server::{router::prompt::PromptRouter, tool::ToolRouter},
    prompt_handler,
    service::RequestContext,
    tool_handler,
};
use rmcp::model::{
    GetPromptRequestParams,
    GetPromptResult,
    Implementation,
    ListPromptsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
};

use crate::tools::series::SeriesLookup;

pub const SERVER_NAME: &str = "promql-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const SERVER_INSTRUCTIONS: &str = r"Welcome to the PromQL MCP server!

You can use this server to interact with a Prometheus-compatible API or TSDB, but only for the purposes of generating queries.
This server does not support querying metrics or series directly, but rather focuses on helping you construct valid PromQL queries.

You can use the tool prometheus_get_series to query the series available in the Prometheus instance. This will help you understand the actual available metrics and their labels
and allow you to construct valid PromQL queries based on that information.

The user can ask a variety of questions related to health, kube pods, questions around specific workloads and so on. Try to use tools/prompts from this server
to generate accurate PromQL queries.";

/// MCP server wrapper around the series lookup and prompt routers.
#[derive(Clone)]
pub struct PromqlMcp {
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
    series: SeriesLookup,
}

impl PromqlMcp {
    /// Creates a server that looks series up through `client` with default limits.
    #[must_use]
    pub fn new(client: PrometheusClient) -> Self {
        Self::with_lookup(SeriesLookup::new(client))
    }

    /// Creates a server around a preconfigured series lookup.
    #[must_use]
    pub fn with_lookup(series: SeriesLookup) -> Self {
        Self {
            tool_router: Self::tool_router_series(),
            prompt_router: Self::create_prompt_router(),
            series,
        }
    }

    /// Base URL of the backend the server is bound to.
    #[must_use]
    pub fn api_url(&self) -> &str {
        self.series.client().base_url()
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for PromqlMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_logging()
                .enable_prompts()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}
