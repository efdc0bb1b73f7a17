//! Core types and the backend client for promql-mcp.
//!
//! This crate owns the data model for series lookups (label sets and lookup
//! windows) and a thin client for the series endpoint of a
//! Prometheus-compatible HTTP API.

pub mod client;
pub mod model;

pub use client::{BackendError, ClientError, PrometheusClient};
pub use model::{LabelSet, SeriesResponse, TimeRange};
