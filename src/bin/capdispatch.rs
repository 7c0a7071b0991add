//! The `capdispatch` server binary.
//!
//! Reads configuration from the environment and command line, builds the
//! stock registry and serves it on stdin/stdout.

use capdispatch::builtin::default_registry;
use capdispatch::capture;
use capdispatch::config::ServerConfig;
use capdispatch::protocol::Server;
use capdispatch::transport::stdio;
use logwise::privacy::LogIt;
use std::sync::Arc;

fn main() {
    let config = ServerConfig::load();
    if config.capture_logs {
        capture::begin_capture();
    }
    let registry = match default_registry(&config) {
        Ok(registry) => registry,
        Err(e) => {
            logwise::error_sync!("capdispatch: invalid capability set: {error}", error = LogIt(&e));
            std::process::exit(2);
        }
    };
    logwise::info_sync!(
        "capdispatch: registered {count} capabilities",
        count = LogIt(&registry.len())
    );
    let server = Server::new(&config, Arc::new(registry));
    if let Err(e) = stdio::run(&server, &config) {
        logwise::error_sync!("capdispatch: {error}", error = LogIt(&e));
        std::process::exit(1);
    }
}
