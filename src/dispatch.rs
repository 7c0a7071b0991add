//! The dispatcher: the single entry point for capability requests.
//!
//! Each request walks the same phases:
//!
//! ```text
//! Resolving ──> Validating ──> Executing ──> Responding
//!     │             │              │             ▲
//!     └─────────────┴──────────────┴─────────────┘
//!              (any failure skips ahead)
//! ```
//!
//! Whatever happens, the caller gets exactly one [`ResponseEnvelope`]. Failures
//! are carried as [`DispatchError`] values through the phases and only turned
//! into an error envelope at the end; a panicking handler is caught and
//! reported the same way as one that returns `Err`.
//!
//! ```
//! use capdispatch::builtin::Echo;
//! use capdispatch::dispatch::{CapabilityRequest, Dispatcher};
//! use capdispatch::registry::RegistryBuilder;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut builder = RegistryBuilder::new();
//! builder.register_tool(Box::new(Echo)).unwrap();
//! let dispatcher = Dispatcher::new(Arc::new(builder.build()));
//!
//! let ok = dispatcher.call_tool(CapabilityRequest::new("echo", [("text", json!("hi"))]));
//! assert!(!ok.is_error());
//! assert_eq!(ok.first_text(), Some("hi"));
//!
//! let unknown = dispatcher.call_tool(CapabilityRequest::without_arguments("doesNotExist"));
//! assert!(unknown.is_error());
//! assert!(unknown.first_text().unwrap().contains("Unknown"));
//! ```

use crate::capability::{CapabilityKind, HandlerError};
use crate::content::{Content, ResourceContents};
use crate::envelope::ResponseEnvelope;
use crate::registry::Registry;
use crate::schema::{Arguments, Violation};
use logwise::privacy::LogIt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Validating,
    Executing,
    Responding,
}

impl Phase {
    /// Where a finished request stopped: the phase that failed, or
    /// `Responding` when every earlier phase succeeded.
    pub fn reached(result: &Result<ResponseEnvelope, DispatchError>) -> Phase {
        match result {
            Ok(_) => Phase::Responding,
            Err(e) => e.phase(),
        }
    }
}

/// Why a capability request failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown {kind}: {name}")]
    UnknownCapability { kind: CapabilityKind, name: String },
    #[error("Invalid arguments: {}", join_violations(.0))]
    InvalidArguments(Vec<Violation>),
    #[error("Handler failed: {0}")]
    HandlerFailure(String),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatchError {
    /// The phase in which this failure arose.
    pub fn phase(&self) -> Phase {
        match self {
            DispatchError::UnknownCapability { .. }
            | DispatchError::ResourceNotFound(_)
            | DispatchError::PromptNotFound(_) => Phase::Resolving,
            DispatchError::InvalidArguments(_) => Phase::Validating,
            DispatchError::HandlerFailure(_) => Phase::Executing,
        }
    }

    /// The error envelope for this failure.
    pub fn into_envelope(self) -> ResponseEnvelope {
        ResponseEnvelope::error(self.to_string())
    }
}

/// A decoded call: which capability, with which arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRequest {
    pub name: String,
    pub arguments: Arguments,
}

impl CapabilityRequest {
    pub fn without_arguments(name: impl Into<String>) -> Self {
        CapabilityRequest {
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    pub fn new<K, I>(name: impl Into<String>, arguments: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        CapabilityRequest {
            name: name.into(),
            arguments: arguments.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Routes requests to handlers registered in a [`Registry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Invokes a tool. Always returns exactly one envelope.
    pub fn call_tool(&self, request: CapabilityRequest) -> ResponseEnvelope {
        let name = request.name.clone();
        respond(CapabilityKind::Tool, &name, self.try_call_tool(request))
    }

    /// Reads a resource by URI. Always returns exactly one envelope.
    pub fn read_resource(&self, uri: &str) -> ResponseEnvelope {
        respond(CapabilityKind::Resource, uri, self.try_read_resource(uri))
    }

    /// Renders a prompt. Always returns exactly one envelope.
    pub fn get_prompt(&self, request: CapabilityRequest) -> ResponseEnvelope {
        let name = request.name.clone();
        respond(CapabilityKind::Prompt, &name, self.try_get_prompt(request))
    }

    fn try_call_tool(&self, request: CapabilityRequest) -> Result<ResponseEnvelope, DispatchError> {
        let tool = self
            .registry
            .tool(&request.name)
            .ok_or_else(|| DispatchError::UnknownCapability {
                kind: CapabilityKind::Tool,
                name: request.name.clone(),
            })?;
        tool.input_schema()
            .validate(&request.arguments)
            .map_err(DispatchError::InvalidArguments)?;
        let content = execute(|| tool.call(request.arguments))?;
        Ok(ResponseEnvelope::success(content))
    }

    fn try_read_resource(&self, uri: &str) -> Result<ResponseEnvelope, DispatchError> {
        let resource = self
            .registry
            .resource(uri)
            .ok_or_else(|| DispatchError::ResourceNotFound(uri.to_string()))?;
        let text = execute(|| resource.read())?;
        Ok(ResponseEnvelope::success(vec![Content::Resource(
            ResourceContents {
                uri: resource.uri().to_string(),
                mime_type: resource.mime_type().to_string(),
                text,
            },
        )]))
    }

    fn try_get_prompt(&self, request: CapabilityRequest) -> Result<ResponseEnvelope, DispatchError> {
        let prompt = self
            .registry
            .prompt(&request.name)
            .ok_or_else(|| DispatchError::PromptNotFound(request.name.clone()))?;
        prompt
            .input_schema()
            .validate(&request.arguments)
            .map_err(DispatchError::InvalidArguments)?;
        // validation guarantees every declared, non-null argument is a string
        let arguments: HashMap<String, String> = request
            .arguments
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        let messages = execute(|| prompt.get(arguments))?;
        Ok(ResponseEnvelope::success(messages)
            .with_description(Some(prompt.description().to_string())))
    }
}

/// Runs a handler, converting both `Err` and panics into `HandlerFailure`.
fn execute<T>(handler: impl FnOnce() -> Result<T, HandlerError>) -> Result<T, DispatchError> {
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DispatchError::HandlerFailure(e.message().to_string())),
        Err(payload) => Err(DispatchError::HandlerFailure(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

fn respond(
    kind: CapabilityKind,
    name: &str,
    result: Result<ResponseEnvelope, DispatchError>,
) -> ResponseEnvelope {
    let phase = Phase::reached(&result);
    match result {
        Ok(envelope) => {
            logwise::info_sync!(
                "dispatch: {kind} {name} succeeded, {phase}",
                kind = LogIt(&kind),
                name = LogIt(&name),
                phase = LogIt(&phase)
            );
            envelope
        }
        Err(e) => {
            logwise::warn_sync!(
                "dispatch: {kind} {name} failed while {phase}: {error}",
                kind = LogIt(&kind),
                name = LogIt(&name),
                phase = LogIt(&phase),
                error = LogIt(&e)
            );
            e.into_envelope()
        }
    }
}
