use std::error::Error;
use std::fmt::{self, Write as _};
use std::time::Duration;

use promql_core::{BackendError, LabelSet, PrometheusClient, TimeRange};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, Span, error, warn};

use crate::PromqlMcp;

/// Upper bound for a single backend call.
pub const SERIES_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Length of the window searched for matching series.
pub const SERIES_LOOKBACK: Duration = Duration::from_secs(60 * 60);
pub const SERIES_HEADER: &str = "We have the following series:\n\n";

/// Parameters for listing series that match a selector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetSeriesParams {
    /// A fully constructed PromQL expr to match the series that will be sent as a match[] arg to the api/v1/series endpoint.
    #[serde(rename = "match")]
    #[schemars(with = "String")]
    pub selector: Option<Value>,
}

#[derive(Debug)]
pub enum SeriesLookupError {
    InvalidMatch,
    Backend(BackendError),
}

impl fmt::Display for SeriesLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMatch => f.write_str("invalid type for 'match', expected string"),
            Self::Backend(err) => write!(f, "error querying Prometheus: {err}"),
        }
    }
}

impl Error for SeriesLookupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidMatch => None,
            Self::Backend(err) => Some(err),
        }
    }
}

impl From<BackendError> for SeriesLookupError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

/// Series lookup behind the `prometheus_get_series` tool.
#[derive(Debug, Clone)]
pub struct SeriesLookup {
    client: PrometheusClient,
    timeout: Duration,
    lookback: Duration,
    span: Span,
}

impl SeriesLookup {
    #[must_use]
    pub fn new(client: PrometheusClient) -> Self {
        Self {
            client,
            timeout: SERIES_LOOKUP_TIMEOUT,
            lookback: SERIES_LOOKBACK,
            span: Span::none(),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches the span lookup failures and warnings are logged under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub const fn client(&self) -> &PrometheusClient {
        &self.client
    }

    /// Lists the series matching the raw `match` argument and renders them as text.
    ///
    /// # Errors
    /// Returns [`SeriesLookupError::InvalidMatch`] without contacting the
    /// backend when `selector` is absent or not a string, and
    /// [`SeriesLookupError::Backend`] when the backend call fails or exceeds
    /// the lookup timeout.
    pub async fn lookup(&self, selector: Option<&Value>) -> Result<String, SeriesLookupError> {
        let Some(Value::String(selector)) = selector else {
            return Err(SeriesLookupError::InvalidMatch);
        };
        self.query(selector).instrument(self.span.clone()).await
    }

    async fn query(&self, selector: &str) -> Result<String, SeriesLookupError> {
        let window = TimeRange::ending_now(self.lookback);
        let response = tokio::time::timeout(self.timeout, self.client.series(selector, window))
            .await
            .unwrap_or_else(|_| Err(BackendError::Timeout(self.timeout)))
            .inspect_err(|err| error!(error = %err, selector, "error querying Prometheus"))?;

        if !response.warnings.is_empty() {
            warn!(warnings = ?response.warnings, selector, "Prometheus warnings");
        }

        Ok(render_series(&response.series))
    }
}

/// Renders the fixed header followed by one selector line per label set.
#[must_use]
pub fn render_series(series: &[LabelSet]) -> String {
    let mut text = String::from(SERIES_HEADER);
    for labels in series {
        let _ = writeln!(text, "{labels}");
    }
    text
}

#[tool_router(router = tool_router_series, vis = "pub")]
impl PromqlMcp {
    #[tool(
        name = "prometheus_get_series",
        description = r#"Allows you to get only series from Prometheus by querying the api/v1/series endpoint with a match param that is fully constructed PromQL expr.
An example output of this tool would be like the following,

We have the following series:

{__name__="some_metric", container="some_container"...}
...

You can actually use this tool to figure out what metrics are available within the Prometheus instance.
With this knowledge, you can then choose to optionally generate PromQL queries to give the user the data they want or to answer their question.
DO NOT try to get ALL series from this tool using match params like __name__=~".*"."#
    )]
    async fn prometheus_get_series(
        &self,
        Parameters(params): Parameters<GetSeriesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.series.lookup(params.selector.as_ref()).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(err) => Ok(CallToolResult::error(vec![Content::text(err.to_string())])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(job: &str) -> LabelSet {
        [("__name__", "up"), ("job", job)].into_iter().collect()
    }

    #[test]
    fn renders_header_and_one_line_per_series() {
        let text = render_series(&[labels("node"), labels("api"), labels("node")]);

        assert_eq!(
            text,
            "We have the following series:\n\n\
             {__name__=\"up\", job=\"node\"}\n\
             {__name__=\"up\", job=\"api\"}\n\
             {__name__=\"up\", job=\"node\"}\n"
        );
    }

    #[test]
    fn renders_header_only_without_series() {
        assert_eq!(render_series(&[]), SERIES_HEADER);
    }

    #[test]
    fn match_parameter_keeps_non_string_values() {
        let params: GetSeriesParams =
            serde_json::from_value(serde_json::json!({ "match": 42 })).expect("params decode");
        assert_eq!(params.selector, Some(Value::from(42)));

        let params: GetSeriesParams =
            serde_json::from_value(serde_json::json!({})).expect("params decode");
        assert_eq!(params.selector, None);
    }

    #[test]
    fn backend_errors_are_prefixed() {
        let err = SeriesLookupError::from(BackendError::Timeout(Duration::from_secs(10)));

        assert_eq!(
            err.to_string(),
            "error querying Prometheus: request timed out after 10s"
        );
    }
}
