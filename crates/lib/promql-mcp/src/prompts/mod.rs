//! MCP prompt templates.
//!
//! Both prompts steer the agent towards `prometheus_get_series` before it
//! writes any query.

pub mod templates;

use rmcp::{
    ErrorData,
    RoleServer,
    handler::server::{router::prompt::PromptRouter, wrapper::Parameters},
    model::{ErrorCode, GetPromptResult, PromptMessage, PromptMessageRole},
    prompt,
    prompt_router,
    schemars,
    service::RequestContext,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{PromqlMcp, helpers};

pub use templates::{PromptError, build_dashboard_prompt, build_query_prompt};

const QUERY_PROMPT_DESCRIPTION: &str =
    "A detailed prompt to generate a PromQL query to answer the user's question the best way possible.";
const DASHBOARD_PROMPT_DESCRIPTION: &str =
    "A detailed prompt to generate a PersesDashboard object to answer the user's question the best way possible.";

/// Arguments for `prometheus_generate_promql`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GeneratePromqlArgs {
    /// The original user's question.
    #[schemars(with = "String")]
    pub question: Option<String>,
}

/// Arguments for `perses_generate_dashboard`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerateDashboardArgs {
    /// The original user's question.
    #[schemars(with = "String")]
    pub question: Option<String>,
    /// The datasource to use for the dashboard, e.g., prometheus.
    #[schemars(with = "String")]
    pub datasource: Option<String>,
    /// The namespace to use for the dashboard, e.g., default.
    #[schemars(with = "String")]
    pub namespace_or_project: Option<String>,
}

#[prompt_router]
impl PromqlMcp {
    pub(crate) fn create_prompt_router() -> PromptRouter<Self> {
        Self::prompt_router()
    }

    /// A detailed prompt to generate a PromQL query to answer the user's question the best way possible.
    #[prompt(name = "prometheus_generate_promql")]
    async fn prometheus_generate_promql(
        &self,
        Parameters(args): Parameters<GeneratePromqlArgs>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        let text = build_query_prompt(self.series.client().base_url(), args.question.as_deref())
            .map_err(map_prompt_err)?;
        Ok(user_prompt(QUERY_PROMPT_DESCRIPTION, text))
    }

    /// A detailed prompt to generate a PersesDashboard object with fully qualified PromQL queries to answer the user's question the best way possible.
    #[prompt(name = "perses_generate_dashboard")]
    async fn perses_generate_dashboard(
        &self,
        Parameters(args): Parameters<GenerateDashboardArgs>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        let text = build_dashboard_prompt(
            args.question.as_deref(),
            args.datasource.as_deref(),
            args.namespace_or_project.as_deref(),
        )
        .map_err(map_prompt_err)?;
        Ok(user_prompt(DASHBOARD_PROMPT_DESCRIPTION, text))
    }
}

/// Wraps assembled prompt text as a single user message.
#[must_use]
pub fn user_prompt(description: &str, text: String) -> GetPromptResult {
    GetPromptResult {
        description: Some(description.to_string()),
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
    }
}

fn map_prompt_err(err: PromptError) -> ErrorData {
    debug!(error = %err, "rejecting prompt request");
    helpers::mcp_err(ErrorCode::INVALID_PARAMS, err.to_string())
}
