//! Typed payload fragments carried in a [`ResponseEnvelope`](crate::envelope::ResponseEnvelope).
//!
//! Every fragment serializes as a JSON object with a `type` tag:
//!
//! * `{"type":"text","text":"..."}`
//! * `{"type":"resource","resource":{"uri":"...","mimeType":"...","text":"..."}}`
//! * `{"type":"message","role":"user","text":"..."}`
//!
//! ```
//! use capdispatch::content::Content;
//!
//! let text = Content::from("Hello, world!");
//! assert_eq!(serde_json::to_string(&text).unwrap(), r#"{"type":"text","text":"Hello, world!"}"#);
//! ```

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Who a prompt message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// The body of a resource read.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceContents {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

/// One fragment of response content.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Content {
    /// Plain text
    Text(String),
    /// The contents of a resource, tagged with its uri and mime type
    Resource(ResourceContents),
    /// A role-tagged prompt message
    Message { role: Role, text: String },
}

impl Content {
    /// Returns the text carried by this fragment, whatever its kind.
    pub fn text(&self) -> &str {
        match self {
            Content::Text(text) => text,
            Content::Resource(resource) => &resource.text,
            Content::Message { text, .. } => text,
        }
    }

    /// A `user` message fragment.
    pub fn user(text: impl Into<String>) -> Self {
        Content::Message {
            role: Role::User,
            text: text.into(),
        }
    }

    /// An `assistant` message fragment.
    pub fn assistant(text: impl Into<String>) -> Self {
        Content::Message {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

impl Serialize for Content {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            Content::Text(text) => {
                let mut s = serializer.serialize_struct("Content", 2)?;
                s.serialize_field("type", "text")?;
                s.serialize_field("text", text)?;
                s.end()
            }
            Content::Resource(resource) => {
                let mut s = serializer.serialize_struct("Content", 2)?;
                s.serialize_field("type", "resource")?;
                s.serialize_field("resource", resource)?;
                s.end()
            }
            Content::Message { role, text } => {
                let mut s = serializer.serialize_struct("Content", 3)?;
                s.serialize_field("type", "message")?;
                s.serialize_field("role", role)?;
                s.serialize_field("text", text)?;
                s.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de;
        struct ContentVisitor;

        impl<'de> Visitor<'de> for ContentVisitor {
            type Value = Content;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a content object with a type tag")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut content_type: Option<String> = None;
                let mut text: Option<String> = None;
                let mut role: Option<Role> = None;
                let mut resource: Option<ResourceContents> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "type" => {
                            if content_type.is_some() {
                                return Err(de::Error::duplicate_field("type"));
                            }
                            content_type = Some(map.next_value()?);
                        }
                        "text" => {
                            if text.is_some() {
                                return Err(de::Error::duplicate_field("text"));
                            }
                            text = Some(map.next_value()?);
                        }
                        "role" => {
                            if role.is_some() {
                                return Err(de::Error::duplicate_field("role"));
                            }
                            role = Some(map.next_value()?);
                        }
                        "resource" => {
                            if resource.is_some() {
                                return Err(de::Error::duplicate_field("resource"));
                            }
                            resource = Some(map.next_value()?);
                        }
                        _ => {
                            let _: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }

                match content_type.as_deref() {
                    Some("text") => {
                        let text = text.ok_or_else(|| de::Error::missing_field("text"))?;
                        Ok(Content::Text(text))
                    }
                    Some("resource") => {
                        let resource = resource.ok_or_else(|| de::Error::missing_field("resource"))?;
                        Ok(Content::Resource(resource))
                    }
                    Some("message") => {
                        let role = role.ok_or_else(|| de::Error::missing_field("role"))?;
                        let text = text.ok_or_else(|| de::Error::missing_field("text"))?;
                        Ok(Content::Message { role, text })
                    }
                    Some(other) => Err(de::Error::unknown_variant(
                        other,
                        &["text", "resource", "message"],
                    )),
                    None => Err(de::Error::missing_field("type")),
                }
            }
        }

        deserializer.deserialize_map(ContentVisitor)
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<ResourceContents> for Content {
    fn from(value: ResourceContents) -> Self {
        Content::Resource(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_fragment_carries_role() {
        let value = serde_json::to_value(Content::assistant("ok")).unwrap();
        assert_eq!(value, json!({"type": "message", "role": "assistant", "text": "ok"}));
    }

    #[test]
    fn resource_fragment_uses_mime_type_key() {
        let content = Content::from(ResourceContents {
            uri: "docs://guide/intro".to_string(),
            mime_type: "text/markdown".to_string(),
            text: "# Intro".to_string(),
        });
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["resource"]["mimeType"], "text/markdown");
        let back: Content = serde_json::from_value(value).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn unknown_fragment_type_is_rejected() {
        let err = serde_json::from_value::<Content>(json!({"type": "image", "data": ""})).unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn message_without_role_is_rejected() {
        assert!(serde_json::from_value::<Content>(json!({"type": "message", "text": "x"})).is_err());
    }
}
