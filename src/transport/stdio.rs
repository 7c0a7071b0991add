//! Serving over the process's standard input and output.
//!
//! stdout carries protocol frames only; logging goes to stderr.

use super::{SessionStats, TransportError, serve};
use crate::config::ServerConfig;
use crate::protocol::Server;
use logwise::privacy::LogIt;

/// Serves `server` on stdin/stdout until stdin closes.
pub fn run(server: &Server, config: &ServerConfig) -> Result<SessionStats, TransportError> {
    logwise::info_sync!(
        "stdio: serving {name} with {framing} framing",
        name = LogIt(&config.server_name),
        framing = LogIt(&config.framing)
    );
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    serve(server, stdin, stdout, config.framing, config.max_frame_bytes)
}
