//! Capability traits and their introspection descriptors.
//!
//! There are three capability classes, each with its own trait:
//!
//! - [`Tool`]: invoked by name with typed arguments
//! - [`Resource`]: read by a URI-like key (`scheme://category/item`)
//! - [`Prompt`]: fetched by name with string arguments, producing role-tagged messages
//!
//! Handlers only produce content or a [`HandlerError`]; wrapping into a
//! [`ResponseEnvelope`](crate::envelope::ResponseEnvelope) is the
//! dispatcher's job.
//!
//! # Implementing a tool
//!
//! ```
//! use capdispatch::capability::{HandlerError, Tool};
//! use capdispatch::content::Content;
//! use capdispatch::schema::{Argument, ArgumentType, Arguments, InputSchema};
//!
//! struct SafeDivide;
//!
//! impl Tool for SafeDivide {
//!     fn name(&self) -> &str { "safe_divide" }
//!     fn description(&self) -> &str { "Divides two numbers" }
//!
//!     fn input_schema(&self) -> InputSchema {
//!         InputSchema::new(vec![
//!             Argument::required("dividend", ArgumentType::Number, "Number to divide"),
//!             Argument::required("divisor", ArgumentType::Number, "Number to divide by"),
//!         ])
//!     }
//!
//!     fn call(&self, args: Arguments) -> Result<Vec<Content>, HandlerError> {
//!         // arguments were validated against input_schema before this runs
//!         let dividend = args["dividend"].as_f64().unwrap_or_default();
//!         let divisor = args["divisor"].as_f64().unwrap_or_default();
//!         if divisor == 0.0 {
//!             return Err(HandlerError::new("Cannot divide by zero"));
//!         }
//!         Ok(vec![format!("{}", dividend / divisor).into()])
//!     }
//! }
//! ```

use crate::content::Content;
use crate::schema::{Argument, ArgumentType, Arguments, InputSchema};
use std::collections::HashMap;

/// A failure reported by a handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(error: std::io::Error) -> Self {
        HandlerError::new(error.to_string())
    }
}

/// A named operation invoked with validated arguments.
///
/// Tools must be `Send + Sync`; the registry holding them is shared behind
/// an `Arc`.
pub trait Tool: Send + Sync {
    /// Unique name used to invoke the tool.
    fn name(&self) -> &str;

    /// Human-readable description shown to callers.
    fn description(&self) -> &str;

    /// The shape `call` expects; checked before every call.
    fn input_schema(&self) -> InputSchema;

    /// Runs the tool.
    ///
    /// `args` has already passed [`InputSchema::validate`]. Returning `Err`
    /// or panicking both produce an error envelope.
    fn call(&self, args: Arguments) -> Result<Vec<Content>, HandlerError>;
}

/// A readable item identified by a URI-like key.
pub trait Resource: Send + Sync {
    /// Key of the form `scheme://category/item`.
    fn uri(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn mime_type(&self) -> &str {
        "text/plain"
    }

    /// Produces the resource body. May perform I/O.
    fn read(&self) -> Result<String, HandlerError>;
}

/// A declared prompt argument. Prompt arguments are always strings.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl PromptArgument {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        PromptArgument {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// A named prompt template producing role-tagged messages.
pub trait Prompt: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn arguments(&self) -> Vec<PromptArgument>;

    /// Renders the prompt. Implementations should return
    /// [`Content::Message`] fragments.
    fn get(&self, args: HashMap<String, String>) -> Result<Vec<Content>, HandlerError>;

    /// The validation shape derived from [`Prompt::arguments`].
    fn input_schema(&self) -> InputSchema {
        InputSchema::new(self.arguments().into_iter().map(|argument| {
            Argument::new(
                argument.name,
                ArgumentType::String,
                argument.description,
                argument.required,
            )
        }))
    }
}

/// The class a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Resource => "resource",
            CapabilityKind::Prompt => "prompt",
        })
    }
}

/// Introspection metadata common to all capability classes.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Descriptor {
    pub kind: CapabilityKind,
    /// Tool or prompt name, or resource URI
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

/// Metadata about a tool, as listed by `tools/list`.
#[derive(Debug, serde::Serialize)]
pub(crate) struct ToolInfo {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
}

impl ToolInfo {
    pub(crate) fn from_tool(tool: &dyn Tool) -> Self {
        ToolInfo {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
        }
    }
}

/// Metadata about a resource, as listed by `resources/list`.
#[derive(Debug, serde::Serialize)]
pub(crate) struct ResourceInfo {
    uri: String,
    name: String,
    description: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

impl ResourceInfo {
    pub(crate) fn from_resource(resource: &dyn Resource) -> Self {
        ResourceInfo {
            uri: resource.uri().to_string(),
            name: resource.name().to_string(),
            description: resource.description().to_string(),
            mime_type: resource.mime_type().to_string(),
        }
    }
}

/// Metadata about a prompt, as listed by `prompts/list`.
#[derive(Debug, serde::Serialize)]
pub(crate) struct PromptInfo {
    name: String,
    description: String,
    arguments: Vec<PromptArgument>,
}

impl PromptInfo {
    pub(crate) fn from_prompt(prompt: &dyn Prompt) -> Self {
        PromptInfo {
            name: prompt.name().to_string(),
            description: prompt.description().to_string(),
            arguments: prompt.arguments(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ToolList {
    pub(crate) tools: Vec<ToolInfo>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ResourceList {
    pub(crate) resources: Vec<ResourceInfo>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct PromptList {
    pub(crate) prompts: Vec<PromptInfo>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct CapabilityList {
    pub(crate) capabilities: Vec<Descriptor>,
}

/// A registered capability, borrowed from the registry.
#[derive(Clone, Copy)]
pub enum Capability<'a> {
    Tool(&'a dyn Tool),
    Resource(&'a dyn Resource),
    Prompt(&'a dyn Prompt),
}

impl Capability<'_> {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Tool(_) => CapabilityKind::Tool,
            Capability::Resource(_) => CapabilityKind::Resource,
            Capability::Prompt(_) => CapabilityKind::Prompt,
        }
    }

    /// Resources have no arguments, so their descriptor carries an empty schema.
    pub fn descriptor(&self) -> Descriptor {
        match self {
            Capability::Tool(tool) => Descriptor {
                kind: CapabilityKind::Tool,
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            },
            Capability::Resource(resource) => Descriptor {
                kind: CapabilityKind::Resource,
                name: resource.uri().to_string(),
                description: resource.description().to_string(),
                input_schema: InputSchema::empty(),
            },
            Capability::Prompt(prompt) => Descriptor {
                kind: CapabilityKind::Prompt,
                name: prompt.name().to_string(),
                description: prompt.description().to_string(),
                input_schema: prompt.input_schema(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Greeting;

    impl Prompt for Greeting {
        fn name(&self) -> &str {
            "greeting"
        }
        fn description(&self) -> &str {
            "Greets someone"
        }
        fn arguments(&self) -> Vec<PromptArgument> {
            vec![
                PromptArgument::new("who", "Person to greet", true),
                PromptArgument::new("tone", "Optional tone", false),
            ]
        }
        fn get(&self, args: HashMap<String, String>) -> Result<Vec<Content>, HandlerError> {
            Ok(vec![Content::user(format!("Say hello to {}", args["who"]))])
        }
    }

    #[test]
    fn prompt_schema_is_all_strings() {
        let value = serde_json::to_value(Greeting.input_schema()).unwrap();
        assert_eq!(value["required"], json!(["who"]));
        assert_eq!(value["properties"]["tone"]["type"], "string");
    }

    #[test]
    fn prompt_info_lists_arguments() {
        let value = serde_json::to_value(PromptInfo::from_prompt(&Greeting)).unwrap();
        assert_eq!(value["arguments"][0]["name"], "who");
        assert_eq!(value["arguments"][1]["required"], false);
    }

    #[test]
    fn descriptor_reports_kind() {
        let descriptor = Capability::Prompt(&Greeting).descriptor();
        assert_eq!(descriptor.kind, CapabilityKind::Prompt);
        assert_eq!(serde_json::to_value(&descriptor).unwrap()["kind"], "prompt");
    }

    #[test]
    fn io_errors_become_handler_errors() {
        let error: HandlerError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(error.message(), "gone");
    }
}
