//! The capabilities a stock `capdispatch` server exposes.
//!
//! - `echo`: returns its `text` argument
//! - `read_logs`: pages through captured logs (only with log capture on)
//! - `dispatch://docs/protocol`: describes the wire protocol
//! - `file://local/<file name>`: one resource per configured file
//! - `explain_capability`: a prompt asking the caller to explain a capability

use crate::capability::{HandlerError, Prompt, PromptArgument, Resource, Tool};
use crate::capture::ReadLogs;
use crate::config::ServerConfig;
use crate::content::Content;
use crate::registry::{Registry, RegistryBuilder, RegistryError};
use crate::schema::{Argument, ArgumentType, Arguments, InputSchema};
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

pub const PROTOCOL_DOC_URI: &str = "dispatch://docs/protocol";

const FILE_URI_BASE: &str = "file://local/";

const PROTOCOL_DOC: &str = "\
capdispatch speaks JSON-RPC 2.0, one message per frame.

Introspection: initialize, ping, tools/list, resources/list, prompts/list,
capabilities/list. None of these invoke a handler.

Invocation:
  tools/call      {name, arguments?}
  resources/read  {uri}
  prompts/get     {name, arguments?}

Every invocation answers with an envelope {content, isError}. A failed lookup,
an argument that does not match the declared input schema, or a failing
handler all produce isError = true with a text fragment saying what went
wrong. Messages without an id are notifications and get no reply.
";

/// Returns its `text` argument unchanged.
///
/// ```
/// use capdispatch::builtin::Echo;
/// use capdispatch::capability::Tool;
/// use serde_json::json;
///
/// let args = [("text".to_string(), json!("hi"))].into_iter().collect();
/// assert_eq!(Echo.call(args).unwrap()[0].text(), "hi");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns the given text unchanged."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![Argument::required("text", ArgumentType::String, "Text to echo back")])
    }

    fn call(&self, args: Arguments) -> Result<Vec<Content>, HandlerError> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerError::new("`text` must be a string"))?;
        Ok(vec![text.into()])
    }
}

/// A resource whose body is fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticResource {
    uri: String,
    name: String,
    description: String,
    mime_type: String,
    text: String,
}

impl StaticResource {
    pub fn new(
        uri: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        StaticResource {
            uri: uri.into(),
            name: name.into(),
            description: description.into(),
            mime_type: "text/plain".to_string(),
            text: text.into(),
        }
    }

    /// The `dispatch://docs/protocol` resource.
    pub fn protocol_doc() -> Self {
        StaticResource::new(
            PROTOCOL_DOC_URI,
            "protocol",
            "How to talk to this server",
            PROTOCOL_DOC,
        )
    }
}

impl Resource for StaticResource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn read(&self) -> Result<String, HandlerError> {
        Ok(self.text.clone())
    }
}

/// A file on disk, read each time the resource is read.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    uri: String,
    name: String,
    description: String,
}

impl FileResource {
    /// Serves `path` as `file://local/<file name>`, percent-encoding the
    /// file name.
    ///
    /// ```
    /// use capdispatch::builtin::FileResource;
    /// use capdispatch::capability::Resource;
    ///
    /// let resource = FileResource::new("notes/my notes.txt").unwrap();
    /// assert_eq!(resource.uri(), "file://local/my%20notes.txt");
    /// assert!(FileResource::new("/").is_err());
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(RegistryError::NoFileName(path)),
        };
        let base_error = || RegistryError::InvalidUri(FILE_URI_BASE.to_string());
        let mut uri = Url::parse(FILE_URI_BASE).map_err(|_| base_error())?;
        uri.path_segments_mut()
            .map_err(|()| base_error())?
            .pop_if_empty()
            .push(&name);
        Ok(FileResource {
            uri: uri.into(),
            description: format!("Contents of {}", path.display()),
            name,
            path,
        })
    }
}

impl Resource for FileResource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn mime_type(&self) -> &str {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some("md") => "text/markdown",
            Some("json") => "application/json",
            _ => "text/plain",
        }
    }

    fn read(&self) -> Result<String, HandlerError> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| HandlerError::new(format!("{}: {e}", self.path.display())))
    }
}

/// Asks the upstream model to explain one capability of this server.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainCapability;

impl Prompt for ExplainCapability {
    fn name(&self) -> &str {
        "explain_capability"
    }

    fn description(&self) -> &str {
        "Explain what a capability of this server does and how to call it"
    }

    fn arguments(&self) -> Vec<PromptArgument> {
        vec![
            PromptArgument::new("name", "Name of the tool or prompt, or a resource URI", true),
            PromptArgument::new("audience", "Who the explanation is for", false),
        ]
    }

    fn get(&self, args: HashMap<String, String>) -> Result<Vec<Content>, HandlerError> {
        let name = args
            .get("name")
            .ok_or_else(|| HandlerError::new("`name` is required"))?;
        let audience = args.get("audience").map(String::as_str).unwrap_or("a developer");
        Ok(vec![
            Content::user(format!(
                "Explain the `{name}` capability to {audience}. Use capabilities/list to find \
                 its description and input schema, then give one example call."
            )),
            Content::assistant(format!(
                "I'll look up `{name}` and describe its arguments and an example request."
            )),
        ])
    }
}

/// Builds the registry for a stock server.
pub fn default_registry(config: &ServerConfig) -> Result<Registry, RegistryError> {
    let mut builder = RegistryBuilder::new();
    builder.register_tool(Box::new(Echo))?;
    if config.capture_logs {
        builder.register_tool(Box::new(ReadLogs::default()))?;
    }
    builder.register_resource(Box::new(StaticResource::protocol_doc()))?;
    for path in &config.resource_files {
        builder.register_resource(Box::new(FileResource::new(path.clone())?))?;
    }
    builder.register_prompt(Box::new(ExplainCapability))?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityKind;
    use std::io::Write;

    #[test]
    fn echo_rejects_non_string() {
        let args = [("text".to_string(), serde_json::json!(3))].into_iter().collect();
        assert!(Echo.call(args).is_err());
    }

    #[test]
    fn file_resource_reads_at_read_time() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(file, "first").unwrap();
        let resource = FileResource::new(file.path()).unwrap();
        assert!(resource.uri().starts_with("file://local/"));
        assert!(resource.uri().ends_with(".md"));
        assert_eq!(resource.mime_type(), "text/markdown");
        assert_eq!(resource.read().unwrap(), "first");

        std::fs::write(file.path(), "second").unwrap();
        assert_eq!(resource.read().unwrap(), "second");
    }

    #[test]
    fn missing_file_is_handler_error() {
        let dir = tempfile::tempdir().unwrap();
        let resource = FileResource::new(dir.path().join("gone.txt")).unwrap();
        assert_eq!(resource.uri(), "file://local/gone.txt");
        assert!(resource.read().unwrap_err().message().contains("gone.txt"));
    }

    #[test]
    fn file_name_with_space_is_percent_encoded_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my notes.txt");
        std::fs::write(&path, "spaced out").unwrap();
        let config = ServerConfig {
            resource_files: vec![path],
            ..ServerConfig::default()
        };
        let registry = default_registry(&config).unwrap();
        let resource = registry.resource("file://local/my%20notes.txt").unwrap();
        assert_eq!(resource.name(), "my notes.txt");
        assert_eq!(resource.read().unwrap(), "spaced out");
    }

    #[test]
    fn path_without_file_name_is_a_configuration_error() {
        for path in ["/", "..", "notes/.."] {
            let config = ServerConfig {
                resource_files: vec![PathBuf::from(path)],
                ..ServerConfig::default()
            };
            assert!(
                matches!(default_registry(&config), Err(RegistryError::NoFileName(p)) if p == PathBuf::from(path)),
                "{path}"
            );
        }
    }

    #[test]
    fn explain_capability_produces_role_tagged_messages() {
        let args = [("name".to_string(), "echo".to_string())].into_iter().collect();
        let messages = ExplainCapability.get(args).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], Content::Message { .. }));
        assert!(messages[0].text().contains("`echo`"));
        assert!(messages[0].text().contains("a developer"));
    }

    #[test]
    fn default_registry_contents() {
        let registry = default_registry(&ServerConfig::default()).unwrap();
        assert!(registry.lookup(CapabilityKind::Tool, "echo").is_some());
        assert!(registry.lookup(CapabilityKind::Tool, "read_logs").is_none());
        assert!(registry.resource(PROTOCOL_DOC_URI).is_some());
        assert!(registry.prompt("explain_capability").is_some());

        let config = ServerConfig {
            capture_logs: true,
            ..ServerConfig::default()
        };
        let registry = default_registry(&config).unwrap();
        assert!(registry.tool("read_logs").is_some());
    }

    #[test]
    fn same_file_name_twice_is_a_configuration_error() {
        let config = ServerConfig {
            resource_files: vec![PathBuf::from("a/notes.txt"), PathBuf::from("b/notes.txt")],
            ..ServerConfig::default()
        };
        assert!(matches!(
            default_registry(&config),
            Err(RegistryError::Duplicate { kind: CapabilityKind::Resource, .. })
        ));
    }
}
