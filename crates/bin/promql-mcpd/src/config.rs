use clap::{ArgAction, Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::logging::LogLevel;

const DEFAULT_API_URL: &str = "http://localhost:9090";
const DEFAULT_MCP_SERVER_URL: &str = "127.0.0.1:8080";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "promql-mcpd", version, about = "PromQL MCP daemon.")]
struct CliArgs {
    /// Base URL of the Prometheus-compatible API.
    #[arg(long, env = "PROMQL_MCP_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Listen address for the streamable HTTP transport, `host:port` or `:port`.
    #[arg(long, env = "PROMQL_MCP_SERVER_URL", default_value = DEFAULT_MCP_SERVER_URL)]
    mcp_server_url: String,

    /// One of debug, info, warn or error.
    #[arg(long, env = "PROMQL_MCP_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Serve MCP over stdin/stdout instead of HTTP. Bare `--stdio` means true.
    #[arg(
        long = "stdio",
        env = "PROMQL_MCP_STDIO",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct McpdConfig {
    pub api_url: String,
    pub mcp_http_addr: SocketAddr,
    pub log_level: LogLevel,
    pub enable_stdio: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl McpdConfig {
    /// Parses the command line, exiting with status 2 on usage errors.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for McpdConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let api_url = args.api_url.trim().to_string();
        if api_url.is_empty() {
            return Err(ConfigError::MissingSetting("PROMQL_MCP_API_URL"));
        }

        let mcp_http_addr = parse_listen_addr(&args.mcp_server_url).ok_or_else(|| {
            ConfigError::InvalidSetting {
                name: "PROMQL_MCP_SERVER_URL",
                value: args.mcp_server_url.clone(),
            }
        })?;

        Ok(Self {
            api_url,
            mcp_http_addr,
            log_level: LogLevel::parse_lenient(&args.log_level),
            enable_stdio: args.enable_stdio,
        })
    }
}

/// Resolves `host:port`, or `:port` on all interfaces.
fn parse_listen_addr(value: &str) -> Option<SocketAddr> {
    let value = value.trim();
    if let Some(port) = value.strip_prefix(':') {
        let port = port.parse::<u16>().ok()?;
        return Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    value.to_socket_addrs().ok()?.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            api_url: DEFAULT_API_URL.to_string(),
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            enable_stdio: false,
        }
    }

    #[test]
    fn defaults_parse() {
        let config = McpdConfig::try_from(base_args()).expect("config should parse");

        assert_eq!(config.api_url, "http://localhost:9090");
        assert_eq!(config.mcp_http_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.enable_stdio);
    }

    #[test]
    fn port_shorthand_binds_all_interfaces() {
        let mut args = base_args();
        args.mcp_server_url = ":9464".to_string();

        let config = McpdConfig::try_from(args).expect("config should parse");

        assert_eq!(config.mcp_http_addr.to_string(), "0.0.0.0:9464");
    }

    #[test]
    fn rejects_unparseable_listen_address() {
        for value in ["not an address", ":http", "127.0.0.1"] {
            let mut args = base_args();
            args.mcp_server_url = value.to_string();

            let err = McpdConfig::try_from(args).expect_err("address should be rejected");

            assert!(matches!(
                err,
                ConfigError::InvalidSetting {
                    name: "PROMQL_MCP_SERVER_URL",
                    ..
                }
            ));
        }
    }

    #[test]
    fn empty_api_url_is_missing() {
        let mut args = base_args();
        args.api_url = "   ".to_string();

        let err = McpdConfig::try_from(args).expect_err("empty URL should be rejected");

        assert!(matches!(
            err,
            ConfigError::MissingSetting("PROMQL_MCP_API_URL")
        ));
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let mut args = base_args();
        args.log_level = "verbose".to_string();

        let config = McpdConfig::try_from(args).expect("config should parse");

        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let args = CliArgs::try_parse_from([
            "promql-mcpd",
            "--api-url",
            "https://thanos.example:10902/prefix",
            "--log-level",
            "WARN",
            "--stdio",
            "true",
        ])
        .expect("arguments should parse");

        let config = McpdConfig::try_from(args).expect("config should parse");

        assert_eq!(config.api_url, "https://thanos.example:10902/prefix");
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.enable_stdio);
    }

    #[test]
    fn stdio_flag_accepts_bare_and_explicit_forms() {
        let parse = |argv: &[&str]| {
            CliArgs::try_parse_from(argv.iter().copied())
                .expect("arguments should parse")
                .enable_stdio
        };

        assert!(parse(&["promql-mcpd", "--stdio"]));
        assert!(parse(&["promql-mcpd", "--stdio", "yes"]));
        assert!(!parse(&["promql-mcpd", "--stdio", "false"]));
        assert!(parse(&["promql-mcpd", "--stdio", "--log-level", "debug"]));
    }
}
