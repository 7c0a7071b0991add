/*!
A small capability-dispatch server for Rust.

capdispatch exposes a fixed set of **tools**, **resources** and **prompts** to a
caller over a framed byte stream (normally the process's stdin and stdout),
speaking JSON-RPC 2.0 with MCP-style method names. Like the rest of this
family of crates it needs no async runtime: requests are handled one at a
time, in order, on the calling thread.

# Overview

```text
 stdin ──> transport ──> protocol ──> dispatch ──> handler
                                         │  ▲
                            registry ────┘  └── schema
 stdout <── transport <── protocol <── ResponseEnvelope
```

- [`registry`]: capabilities are registered once at startup into an
  immutable [`Registry`](registry::Registry)
- [`schema`]: every invocation's arguments are checked against the declared
  [`InputSchema`](schema::InputSchema) before the handler runs
- [`dispatch`]: resolves, validates, executes, and always answers with exactly
  one [`ResponseEnvelope`](envelope::ResponseEnvelope), even if the handler panics
- [`transport`]: reads frames, answers them, and resynchronizes after
  malformed input

# Quick Start

```
use capdispatch::capability::{HandlerError, Tool};
use capdispatch::content::Content;
use capdispatch::dispatch::{CapabilityRequest, Dispatcher};
use capdispatch::registry::RegistryBuilder;
use capdispatch::schema::{Argument, ArgumentType, Arguments, InputSchema};
use serde_json::json;
use std::sync::Arc;

struct Hello;

impl Tool for Hello {
    fn name(&self) -> &str { "hello" }
    fn description(&self) -> &str { "Greets a user by name" }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Argument::required("name", ArgumentType::String, "Name to greet")])
    }

    fn call(&self, args: Arguments) -> Result<Vec<Content>, HandlerError> {
        let name = args["name"].as_str().unwrap_or_default();
        Ok(vec![format!("Hello, {name}!").into()])
    }
}

let mut builder = RegistryBuilder::new();
builder.register_tool(Box::new(Hello)).unwrap();
let dispatcher = Dispatcher::new(Arc::new(builder.build()));

let envelope = dispatcher.call_tool(CapabilityRequest::new("hello", [("name", json!("Ada"))]));
assert_eq!(envelope.first_text(), Some("Hello, Ada!"));

let envelope = dispatcher.call_tool(CapabilityRequest::new("hello", [("name", json!(42))]));
assert!(envelope.is_error());
```

## Serving on stdio

```no_run
use capdispatch::builtin::default_registry;
use capdispatch::config::ServerConfig;
use capdispatch::protocol::Server;
use capdispatch::transport::stdio;
use std::sync::Arc;

let config = ServerConfig::default();
let server = Server::new(&config, Arc::new(default_registry(&config).unwrap()));
stdio::run(&server, &config).unwrap();
```

# Logging

Logging uses [logwise](https://docs.rs/logwise). Records go to
stderr; with [`capture::begin_capture`] they are also kept in memory and can
be read back through the `read_logs` tool.
*/

pub mod builtin;
pub mod capability;
pub mod capture;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod envelope;
pub mod jrpc;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod transport;
