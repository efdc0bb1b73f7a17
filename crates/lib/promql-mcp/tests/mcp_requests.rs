use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use promql_core::PrometheusClient;
use promql_mcp::PromqlMcp;
use promql_mcp::server::{HttpTransport, McpHttpServerConfig, Servable};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

struct McpHarness {
    http: reqwest::Client,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl McpHarness {
    async fn start(api_url: &str) -> Self {
        let client = PrometheusClient::new(api_url).expect("valid base URL");
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve a local port");
        let addr = listener.local_addr().expect("reserved port address");
        drop(listener);

        let config = McpHttpServerConfig::new(addr)
            .with_stateful_mode(false)
            .with_sse_keep_alive(None);
        let shutdown = CancellationToken::new();
        tokio::spawn(HttpTransport::new(PromqlMcp::new(client), config).serve(shutdown.clone()));

        let harness = Self {
            http: reqwest::Client::new(),
            addr,
            shutdown,
        };
        harness.wait_until_healthy().await;
        harness
    }

    async fn wait_until_healthy(&self) {
        for _ in 0..50 {
            let health = self.http.get(format!("http://{}/health", self.addr)).send().await;
            if health.is_ok_and(|response| response.status().is_success()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("MCP server never became healthy on {}", self.addr);
    }

    /// Sends one JSON-RPC request and returns its response message.
    async fn request(&self, method: &str, params: Value) -> Value {
        let request = json!({ "jsonrpc": "2.0", "id": 7, "method": method, "params": params });
        let response = self
            .http
            .post(format!("http://{}/mcp", self.addr))
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .body(request.to_string())
            .send()
            .await
            .expect("MCP request");
        assert!(response.status().is_success(), "status {}", response.status());
        let body = tokio::time::timeout(Duration::from_secs(5), response.text())
            .await
            .expect("MCP response should complete")
            .expect("MCP response body");
        response_message(&body)
    }

    async fn call_tool(&self, arguments: Value) -> Value {
        let message = self
            .request(
                "tools/call",
                json!({ "name": "prometheus_get_series", "arguments": arguments }),
            )
            .await;
        message
            .get("result")
            .cloned()
            .unwrap_or_else(|| panic!("expected a tool result, got {message}"))
    }

    async fn get_prompt(&self, name: &str, arguments: Value) -> Value {
        self.request("prompts/get", json!({ "name": name, "arguments": arguments }))
            .await
    }
}

impl Drop for McpHarness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Extracts the JSON-RPC response from a plain JSON or SSE body.
fn response_message(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).expect("JSON response body");
    }
    trimmed
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .find(|message| message.get("id").is_some())
        .unwrap_or_else(|| panic!("no JSON-RPC response in body: {body}"))
}

fn tool_text(result: &Value) -> &str {
    result["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("tool result has no text content: {result}"))
}

async fn spawn_backend(body: &'static str) -> SocketAddr {
    let app = Router::new().route("/api/v1/series", get(move || async move { body }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock backend");
    let addr = listener.local_addr().expect("mock backend address");
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock backend failed");
    });
    addr
}

// Nothing listens on the discard port, so every backend call fails fast.
const UNREACHABLE_API: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn series_tool_returns_rendered_text() {
    let backend = spawn_backend(
        r#"{"status":"success","data":[{"__name__":"up","job":"node"},{"__name__":"up","job":"api"}]}"#,
    )
    .await;
    let mcp = McpHarness::start(&format!("http://{backend}")).await;

    let result = mcp.call_tool(json!({ "match": "up" })).await;

    assert_ne!(result["isError"], json!(true));
    assert_eq!(
        tool_text(&result),
        "We have the following series:\n\n{__name__=\"up\", job=\"node\"}\n{__name__=\"up\", job=\"api\"}\n"
    );
}

#[tokio::test]
async fn series_tool_reports_bad_match_as_error_result() {
    let mcp = McpHarness::start(UNREACHABLE_API).await;

    for arguments in [json!({}), json!({ "match": 42 }), json!({ "match": ["up"] })] {
        let result = mcp.call_tool(arguments).await;

        assert_eq!(result["isError"], json!(true));
        assert_eq!(tool_text(&result), "invalid type for 'match', expected string");
    }
}

#[tokio::test]
async fn series_tool_reports_backend_failure_as_error_result() {
    let mcp = McpHarness::start(UNREACHABLE_API).await;

    let result = mcp.call_tool(json!({ "match": "up" })).await;

    assert_eq!(result["isError"], json!(true));
    assert!(
        tool_text(&result).starts_with("error querying Prometheus: "),
        "unexpected text: {}",
        tool_text(&result)
    );
}

#[tokio::test]
async fn query_prompt_is_a_single_user_message() {
    let mcp = McpHarness::start("http://localhost:9090").await;

    let message = mcp
        .get_prompt(
            "prometheus_generate_promql",
            json!({ "question": "How many pods are restarting?" }),
        )
        .await;

    let messages = message["result"]["messages"]
        .as_array()
        .unwrap_or_else(|| panic!("expected prompt messages, got {message}"));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], json!("user"));
    let text = messages[0]["content"]["text"].as_str().expect("text content");
    assert!(text.contains("http://localhost:9090/api/v1/query?query=your_query_here"));
    assert!(text.ends_with("How many pods are restarting?"));
}

#[tokio::test]
async fn dashboard_prompt_names_first_missing_argument() {
    let mcp = McpHarness::start("http://localhost:9090").await;

    let message = mcp
        .get_prompt(
            "perses_generate_dashboard",
            json!({ "question": "Show node CPU" }),
        )
        .await;

    assert!(message.get("result").is_none(), "unexpected result: {message}");
    assert_eq!(message["error"]["code"], json!(-32602));
    assert_eq!(message["error"]["message"], json!("datasource is required"));
}
