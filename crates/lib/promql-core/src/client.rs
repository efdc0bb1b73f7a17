//! Client for the series endpoint of a Prometheus-compatible HTTP API.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{Instrument, Span, debug};
use url::Url;

use crate::model::{LabelSet, SeriesResponse, TimeRange};

const SERIES_ENDPOINT: [&str; 3] = ["api", "v1", "series"];
const STATUS_ERROR: &str = "error";

/// Errors raised while constructing a [`PrometheusClient`].
#[derive(Debug)]
pub enum ClientError {
    InvalidUrl { url: String, reason: String },
    Build(reqwest::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, reason } => write!(f, "invalid API URL {url:?}: {reason}"),
            Self::Build(err) => write!(f, "failed to build HTTP client: {err}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidUrl { .. } => None,
            Self::Build(err) => Some(err),
        }
    }
}

/// Errors raised by a backend call.
#[derive(Debug)]
pub enum BackendError {
    Transport(reqwest::Error),
    Status { status: StatusCode, body: String },
    Api { error_type: String, message: String },
    Decode(String),
    Timeout(Duration),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "{err}"),
            Self::Status { status, body } if body.is_empty() => {
                write!(f, "server returned HTTP status {status}")
            }
            Self::Status { status, body } => {
                write!(f, "server returned HTTP status {status}: {body}")
            }
            Self::Api {
                error_type,
                message,
            } => write!(f, "{error_type}: {message}"),
            Self::Decode(message) => write!(f, "failed to decode response: {message}"),
            Self::Timeout(after) => write!(f, "request timed out after {after:?}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

/// Response envelope shared by every endpoint of the HTTP API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// HTTP client bound to a single Prometheus-compatible base URL.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: Url,
    display_url: String,
    span: Span,
}

impl PrometheusClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUrl`] when the URL cannot be parsed or is
    /// not an absolute http(s) URL, and [`ClientError::Build`] when the HTTP
    /// client cannot be initialized.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = parse_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(ClientError::Build)?;
        let display_url = parsed.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url: parsed,
            display_url,
            span: Span::none(),
        })
    }

    /// Attaches the span that backend requests are recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The configured base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.display_url
    }

    /// Lists the label sets of all series matching `selector` within `window`.
    ///
    /// Series are returned in backend order together with any warnings the
    /// backend attached to a successful response.
    ///
    /// # Errors
    /// Returns a [`BackendError`] on transport failure, a non-success
    /// response, or a body that cannot be decoded.
    pub async fn series(
        &self,
        selector: &str,
        window: TimeRange,
    ) -> Result<SeriesResponse, BackendError> {
        let url = self.endpoint(&SERIES_ENDPOINT);
        let start = window.start_param();
        let end = window.end_param();

        async move {
            debug!(%url, selector, %start, %end, "listing series");
            let response = self
                .http
                .get(url)
                .query(&[
                    ("match[]", selector),
                    ("start", start.as_str()),
                    ("end", end.as_str()),
                ])
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            decode_series(status, &body)
        }
        .instrument(self.span.clone())
        .await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };
    let url = Url::parse(base_url.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".to_string()));
    }
    Ok(url)
}

fn decode_series(status: StatusCode, body: &[u8]) -> Result<SeriesResponse, BackendError> {
    let envelope = match serde_json::from_slice::<ApiEnvelope<Vec<LabelSet>>>(body) {
        Ok(envelope) => envelope,
        Err(err) if status.is_success() => return Err(BackendError::Decode(err.to_string())),
        Err(_) => return Err(status_error(status, body)),
    };

    if envelope.status == STATUS_ERROR {
        return Err(BackendError::Api {
            error_type: envelope.error_type.unwrap_or_default(),
            message: envelope.error.unwrap_or_default(),
        });
    }
    if !status.is_success() {
        return Err(status_error(status, body));
    }

    Ok(SeriesResponse {
        series: envelope.data.unwrap_or_default(),
        warnings: envelope.warnings,
    })
}

fn status_error(status: StatusCode, body: &[u8]) -> BackendError {
    BackendError::Status {
        status,
        body: String::from_utf8_lossy(body).trim().to_string(),
    }
}
