//! Server configuration.
//!
//! [`Cli`] is the command line, parsed with clap. Each flag can also be set
//! through a `CAPDISPATCH_*` environment variable; a flag given on the command
//! line wins over the environment, and the environment wins over the default.
//! The parsed [`Cli`] resolves into a [`ServerConfig`].
//!
//! ```
//! use capdispatch::config::ServerConfig;
//! use capdispatch::transport::Framing;
//!
//! let config = ServerConfig::try_from_args(["capdispatch", "--framing", "length-prefixed", "--capture-logs"]).unwrap();
//! assert_eq!(config.framing, Framing::LengthPrefixed);
//! assert!(config.capture_logs);
//! ```

use crate::transport::Framing;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20;
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

/// capdispatch: serve tools, resources and prompts over stdio
#[derive(Debug, Parser)]
#[command(name = "capdispatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Frame format on stdin/stdout
    #[arg(long, env = "CAPDISPATCH_FRAMING", value_enum, default_value_t = Framing::Lines)]
    pub framing: Framing,

    /// Largest accepted inbound frame, in bytes
    #[arg(
        long,
        env = "CAPDISPATCH_MAX_FRAME_BYTES",
        value_name = "BYTES",
        default_value_t = DEFAULT_MAX_FRAME_BYTES,
        value_parser = parse_frame_limit
    )]
    pub max_frame_bytes: usize,

    /// Keep log records in memory for the read_logs tool
    #[arg(long, env = "CAPDISPATCH_CAPTURE_LOGS")]
    pub capture_logs: bool,

    /// Name reported to clients in `initialize`
    #[arg(
        long,
        env = "CAPDISPATCH_SERVER_NAME",
        default_value = env!("CARGO_PKG_NAME"),
        value_parser = parse_server_name
    )]
    pub server_name: String,

    /// Serve FILE as file://local/<file name> (repeatable)
    #[arg(long = "resource", value_name = "FILE")]
    pub resources: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Reported in `initialize` as `serverInfo.name`
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: String,
    pub framing: Framing,
    pub max_frame_bytes: usize,
    pub capture_logs: bool,
    /// Files served as `file://local/<file name>` resources
    pub resource_files: Vec<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            server_name: env!("CARGO_PKG_NAME").to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            framing: Framing::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            capture_logs: false,
            resource_files: Vec::new(),
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        ServerConfig {
            server_name: cli.server_name,
            framing: cli.framing,
            max_frame_bytes: cli.max_frame_bytes,
            capture_logs: cli.capture_logs,
            resource_files: cli.resources,
            ..ServerConfig::default()
        }
    }
}

impl ServerConfig {
    /// Parses the process arguments and environment.
    ///
    /// Prints help, version or a usage error and exits the process when clap
    /// asks for it.
    pub fn load() -> ServerConfig {
        Cli::parse().into()
    }

    /// Parses `args` (including the program name) and the process
    /// environment.
    pub fn try_from_args<I, T>(args: I) -> Result<ServerConfig, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(args).map(Into::into)
    }
}

fn parse_frame_limit(value: &str) -> Result<usize, String> {
    let limit: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a positive integer"))?;
    if limit == 0 {
        return Err("must be greater than zero".to_string());
    }
    if u32::try_from(limit).is_err() {
        return Err("must fit in a 32-bit length prefix".to_string());
    }
    Ok(limit)
}

fn parse_server_name(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}
