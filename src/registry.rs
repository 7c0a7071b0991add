//! The capability registry.
//!
//! A [`RegistryBuilder`] collects tools, resources and prompts at startup.
//! Duplicate names, empty names, and malformed resource URIs are rejected at
//! registration time. [`RegistryBuilder::build`] then produces an immutable
//! [`Registry`]; nothing can be registered after that, so lookups need no
//! locking.
//!
//! ```
//! use capdispatch::builtin::Echo;
//! use capdispatch::capability::CapabilityKind;
//! use capdispatch::registry::{RegistryBuilder, RegistryError};
//!
//! let mut builder = RegistryBuilder::new();
//! builder.register_tool(Box::new(Echo)).unwrap();
//! assert!(matches!(
//!     builder.register_tool(Box::new(Echo)),
//!     Err(RegistryError::Duplicate { .. })
//! ));
//!
//! let registry = builder.build();
//! assert!(registry.lookup(CapabilityKind::Tool, "echo").is_some());
//! assert!(registry.lookup(CapabilityKind::Tool, "missing").is_none());
//! ```

use crate::capability::{
    Capability, CapabilityKind, CapabilityList, Prompt, PromptInfo, PromptList, Resource,
    ResourceInfo, ResourceList, Tool, ToolInfo, ToolList,
};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static RESOURCE_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/\s]+(/\S*)?$").expect("resource uri pattern is valid")
});

/// Returns true if `uri` has the `scheme://authority[/path]` shape required
/// of resource keys.
pub fn is_resource_uri(uri: &str) -> bool {
    RESOURCE_URI.is_match(uri)
}

/// Configuration errors detected while building a registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} `{name}` is already registered")]
    Duplicate { kind: CapabilityKind, name: String },
    #[error("{kind} registered with an empty name")]
    EmptyName { kind: CapabilityKind },
    #[error("`{0}` is not a valid resource uri (expected scheme://category/item)")]
    InvalidUri(String),
    #[error("`{}` has no file name to serve it under", .0.display())]
    NoFileName(PathBuf),
}

/// Collects capabilities before the server starts.
#[derive(Default)]
pub struct RegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
    resources: Vec<Box<dyn Resource>>,
    prompts: Vec<Box<dyn Prompt>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    pub fn register_tool(&mut self, tool: Box<dyn Tool>) -> Result<&mut Self, RegistryError> {
        check_name(CapabilityKind::Tool, tool.name())?;
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(RegistryError::Duplicate {
                kind: CapabilityKind::Tool,
                name: tool.name().to_string(),
            });
        }
        self.tools.push(tool);
        Ok(self)
    }

    pub fn register_resource(
        &mut self,
        resource: Box<dyn Resource>,
    ) -> Result<&mut Self, RegistryError> {
        check_name(CapabilityKind::Resource, resource.uri())?;
        if !is_resource_uri(resource.uri()) {
            return Err(RegistryError::InvalidUri(resource.uri().to_string()));
        }
        if self.resources.iter().any(|r| r.uri() == resource.uri()) {
            return Err(RegistryError::Duplicate {
                kind: CapabilityKind::Resource,
                name: resource.uri().to_string(),
            });
        }
        self.resources.push(resource);
        Ok(self)
    }

    pub fn register_prompt(&mut self, prompt: Box<dyn Prompt>) -> Result<&mut Self, RegistryError> {
        check_name(CapabilityKind::Prompt, prompt.name())?;
        if self.prompts.iter().any(|p| p.name() == prompt.name()) {
            return Err(RegistryError::Duplicate {
                kind: CapabilityKind::Prompt,
                name: prompt.name().to_string(),
            });
        }
        self.prompts.push(prompt);
        Ok(self)
    }

    /// Freezes the builder into a read-only registry.
    pub fn build(self) -> Registry {
        let index = |names: Vec<&str>| -> HashMap<String, usize> {
            names
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i))
                .collect()
        };
        let tool_index = index(self.tools.iter().map(|t| t.name()).collect());
        let resource_index = index(self.resources.iter().map(|r| r.uri()).collect());
        let prompt_index = index(self.prompts.iter().map(|p| p.name()).collect());
        Registry {
            tools: self.tools,
            resources: self.resources,
            prompts: self.prompts,
            tool_index,
            resource_index,
            prompt_index,
        }
    }
}

fn check_name(kind: CapabilityKind, name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        Err(RegistryError::EmptyName { kind })
    } else {
        Ok(())
    }
}

/// The immutable set of capabilities served by this process.
///
/// Listing preserves registration order.
pub struct Registry {
    tools: Vec<Box<dyn Tool>>,
    resources: Vec<Box<dyn Resource>>,
    prompts: Vec<Box<dyn Prompt>>,
    tool_index: HashMap<String, usize>,
    resource_index: HashMap<String, usize>,
    prompt_index: HashMap<String, usize>,
}

impl Registry {
    /// Finds a capability by kind and name (the URI, for resources).
    pub fn lookup(&self, kind: CapabilityKind, name: &str) -> Option<Capability<'_>> {
        match kind {
            CapabilityKind::Tool => self.tool(name).map(Capability::Tool),
            CapabilityKind::Resource => self.resource(name).map(Capability::Resource),
            CapabilityKind::Prompt => self.prompt(name).map(Capability::Prompt),
        }
    }

    pub fn tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tool_index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn resource(&self, uri: &str) -> Option<&dyn Resource> {
        self.resource_index.get(uri).map(|&i| self.resources[i].as_ref())
    }

    pub fn prompt(&self, name: &str) -> Option<&dyn Prompt> {
        self.prompt_index.get(name).map(|&i| self.prompts[i].as_ref())
    }

    /// Every capability, tools first, then resources, then prompts.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability<'_>> {
        self.tools
            .iter()
            .map(|t| Capability::Tool(t.as_ref()))
            .chain(self.resources.iter().map(|r| Capability::Resource(r.as_ref())))
            .chain(self.prompts.iter().map(|p| Capability::Prompt(p.as_ref())))
    }

    pub fn len(&self) -> usize {
        self.tools.len() + self.resources.len() + self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn tool_list(&self) -> ToolList {
        ToolList {
            tools: self.tools.iter().map(|t| ToolInfo::from_tool(t.as_ref())).collect(),
        }
    }

    pub(crate) fn resource_list(&self) -> ResourceList {
        ResourceList {
            resources: self
                .resources
                .iter()
                .map(|r| ResourceInfo::from_resource(r.as_ref()))
                .collect(),
        }
    }

    pub(crate) fn prompt_list(&self) -> PromptList {
        PromptList {
            prompts: self
                .prompts
                .iter()
                .map(|p| PromptInfo::from_prompt(p.as_ref()))
                .collect(),
        }
    }

    pub(crate) fn capability_list(&self) -> CapabilityList {
        CapabilityList {
            capabilities: self.capabilities().map(|c| c.descriptor()).collect(),
        }
    }
}
