//! JSON-RPC method routing.
//!
//! [`Server`] owns the dispatcher and answers one decoded frame at a time.
//! Introspection methods are served straight from the registry; invocation
//! methods decode their params into a [`CapabilityRequest`] and hand it to the
//! [`Dispatcher`]. Params that cannot be decoded are a protocol error
//! (`-32602`) and never reach the dispatcher.
//!
//! ```
//! use capdispatch::builtin::default_registry;
//! use capdispatch::config::ServerConfig;
//! use capdispatch::protocol::Server;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let config = ServerConfig::default();
//! let server = Server::new(&config, Arc::new(default_registry(&config).unwrap()));
//!
//! let frame = br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#;
//! let response = server.handle_frame(frame).unwrap();
//! assert_eq!(response.result.unwrap(), json!({"content":[{"type":"text","text":"hi"}],"isError":false}));
//! ```

use crate::config::ServerConfig;
use crate::dispatch::{CapabilityRequest, Dispatcher};
use crate::jrpc::{Error, Message, Notification, Request, Response};
use crate::registry::Registry;
use crate::schema::Arguments;
use logwise::privacy::LogIt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
struct ListChanged {
    #[serde(rename = "listChanged")]
    list_changed: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
struct ServerCapabilities {
    tools: ListChanged,
    resources: ListChanged,
    prompts: ListChanged,
}

#[derive(Debug, Clone, serde::Serialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
}

/// Params of `tools/call` and `prompts/get`. Other fields (such as `_meta`)
/// are ignored.
#[derive(Debug, serde::Deserialize)]
struct InvokeParams {
    name: String,
    #[serde(default)]
    arguments: Option<Arguments>,
}

impl From<InvokeParams> for CapabilityRequest {
    fn from(params: InvokeParams) -> Self {
        CapabilityRequest {
            name: params.name,
            arguments: params.arguments.unwrap_or_default(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ReadParams {
    uri: String,
}

/// Answers JSON-RPC messages for one registry.
#[derive(Clone)]
pub struct Server {
    dispatcher: Dispatcher,
    initialize: InitializeResult,
}

impl Server {
    pub fn new(config: &ServerConfig, registry: Arc<Registry>) -> Self {
        // the registry is immutable, so the lists never change
        let unchanging = ListChanged::default();
        Server {
            dispatcher: Dispatcher::new(registry),
            initialize: InitializeResult {
                protocol_version: config.protocol_version.clone(),
                capabilities: ServerCapabilities {
                    tools: unchanging.clone(),
                    resources: unchanging.clone(),
                    prompts: unchanging,
                },
                server_info: ServerInfo {
                    name: config.server_name.clone(),
                    version: config.server_version.clone(),
                },
            },
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Decodes and answers one raw frame.
    ///
    /// Returns `None` for notifications. Frames that are not valid JSON-RPC
    /// get an error response.
    pub fn handle_frame(&self, bytes: &[u8]) -> Option<Response<Value>> {
        match Message::decode(bytes) {
            Ok(message) => self.handle(message),
            Err(malformed) => {
                logwise::warn_sync!(
                    "protocol: malformed frame: {error}",
                    error = LogIt(&malformed.error)
                );
                Some(malformed.into_response())
            }
        }
    }

    pub fn handle(&self, message: Message) -> Option<Response<Value>> {
        match message {
            Message::Request(request) => Some(self.handle_request(request)),
            Message::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
        }
    }

    fn handle_notification(&self, notification: Notification) {
        logwise::info_sync!(
            "protocol: notification {method}",
            method = LogIt(&notification.method)
        );
    }

    fn handle_request(&self, request: Request) -> Response<Value> {
        logwise::info_sync!("protocol: request {method}", method = LogIt(&request.method));
        let Request {
            method, params, id, ..
        } = request;
        let registry = self.dispatcher.registry();
        match method.as_str() {
            "initialize" => Response::new(self.initialize.clone(), id).erase(),
            "ping" => Response::new(serde_json::json!({}), id),
            "tools/list" => Response::new(registry.tool_list(), id).erase(),
            "resources/list" => Response::new(registry.resource_list(), id).erase(),
            "prompts/list" => Response::new(registry.prompt_list(), id).erase(),
            "capabilities/list" => Response::new(registry.capability_list(), id).erase(),
            "tools/call" => match decode_params::<InvokeParams>(params) {
                Ok(params) => Response::new(self.dispatcher.call_tool(params.into()), id).erase(),
                Err(e) => Response::err(e, id),
            },
            "resources/read" => match decode_params::<ReadParams>(params) {
                Ok(params) => Response::new(self.dispatcher.read_resource(&params.uri), id).erase(),
                Err(e) => Response::err(e, id),
            },
            "prompts/get" => match decode_params::<InvokeParams>(params) {
                Ok(params) => Response::new(self.dispatcher.get_prompt(params.into()), id).erase(),
                Err(e) => Response::err(e, id),
            },
            _ => {
                logwise::warn_sync!("protocol: unknown method {method}", method = LogIt(&method));
                Response::err(Error::method_not_found(&method), id)
            }
        }
    }
}

/// Missing params decode as an empty object.
fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, Error> {
    let params = params.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(params).map_err(|e| Error::invalid_params(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::default_registry;
    use serde_json::json;

    fn server() -> Server {
        let config = ServerConfig {
            server_name: "test-server".to_string(),
            ..ServerConfig::default()
        };
        Server::new(&config, Arc::new(default_registry(&config).unwrap()))
    }

    fn call(method: &str, params: Value) -> Response<Value> {
        let frame = serde_json::to_vec(&json!({
            "jsonrpc": "2.0", "id": 7, "method": method, "params": params
        }))
        .unwrap();
        server().handle_frame(&frame).unwrap()
    }

    #[test]
    fn initialize_reports_server_info() {
        let result = call("initialize", json!({})).result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "test-server");
        assert_eq!(result["protocolVersion"], crate::config::DEFAULT_PROTOCOL_VERSION);
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[test]
    fn ping_answers_empty_object() {
        let response = call("ping", Value::Null);
        assert_eq!(response.result, Some(json!({})));
        assert_eq!(response.id, json!(7));
    }

    #[test]
    fn listings_come_from_registry() {
        let tools = call("tools/list", json!({})).result.unwrap();
        assert_eq!(tools["tools"][0]["name"], "echo");
        assert_eq!(tools["tools"][0]["inputSchema"]["required"], json!(["text"]));

        let resources = call("resources/list", json!({})).result.unwrap();
        assert_eq!(resources["resources"][0]["uri"], "dispatch://docs/protocol");

        let prompts = call("prompts/list", json!({})).result.unwrap();
        assert_eq!(prompts["prompts"][0]["arguments"][0]["name"], "name");

        let all = call("capabilities/list", json!({})).result.unwrap();
        let kinds: Vec<_> = all["capabilities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, ["tool", "resource", "prompt"]);
    }

    #[test]
    fn unknown_tool_is_an_envelope_not_a_protocol_error() {
        let response = call("tools/call", json!({"name": "doesNotExist", "arguments": {}}));
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("Unknown"));
    }

    #[test]
    fn undecodable_params_are_invalid_params() {
        let missing_name = call("tools/call", json!({"arguments": {}}));
        assert_eq!(missing_name.error.unwrap().code, -32602);

        let bad_arguments = call("tools/call", json!({"name": "echo", "arguments": "hi"}));
        assert_eq!(bad_arguments.error.unwrap().code, -32602);

        let no_uri = call("resources/read", Value::Null);
        assert_eq!(no_uri.error.unwrap().code, -32602);
    }

    #[test]
    fn resource_read_and_prompt_get() {
        let read = call("resources/read", json!({"uri": "dispatch://docs/protocol"}))
            .result
            .unwrap();
        assert_eq!(read["isError"], false);
        assert_eq!(read["content"][0]["type"], "resource");
        assert_eq!(read["content"][0]["resource"]["uri"], "dispatch://docs/protocol");

        let prompt = call("prompts/get", json!({"name": "explain_capability", "arguments": {"name": "echo"}}))
            .result
            .unwrap();
        assert_eq!(prompt["content"][0]["type"], "message");
        assert_eq!(prompt["content"][0]["role"], "user");
        assert!(prompt["description"].is_string());
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let error = call("tools/frobnicate", json!({})).error.unwrap();
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("tools/frobnicate"));
    }

    #[test]
    fn notifications_get_no_response() {
        let frame = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server().handle_frame(frame).is_none());
    }

    #[test]
    fn malformed_frame_gets_null_id_error() {
        let response = server().handle_frame(b"[1,2,3]").unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, -32600);
    }
}
