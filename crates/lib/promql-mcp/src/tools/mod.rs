//! MCP tool modules.
//!
//! The server exposes a single tool that lists series known to the backend
//! so an agent can ground the queries it writes.

pub mod series;
