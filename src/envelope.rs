//! The uniform response wrapper.
//!
//! Every capability request that reaches the dispatcher yields exactly one
//! [`ResponseEnvelope`]. Success and failure are distinguished only by
//! `isError` and the human-readable content; no error crosses the transport
//! as anything other than an envelope.
//!
//! ```
//! use capdispatch::envelope::ResponseEnvelope;
//! use serde_json::json;
//!
//! let envelope = ResponseEnvelope::success(vec!["hi".into()]);
//! assert_eq!(
//!     serde_json::to_value(&envelope).unwrap(),
//!     json!({"content": [{"type": "text", "text": "hi"}], "isError": false})
//! );
//! ```

use crate::content::Content;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseEnvelope {
    /// Ordered payload fragments
    pub(crate) content: Vec<Content>,
    /// Whether this envelope reports a failure
    #[serde(rename = "isError")]
    pub(crate) is_error: bool,
    /// Prompt description, only present on prompt responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
}

impl ResponseEnvelope {
    /// Wraps handler output as a successful envelope.
    pub fn success(content: Vec<Content>) -> Self {
        ResponseEnvelope {
            content,
            is_error: false,
            description: None,
        }
    }

    /// An error envelope with a single text fragment.
    ///
    /// ```
    /// use capdispatch::envelope::ResponseEnvelope;
    ///
    /// let envelope = ResponseEnvelope::error("Unknown tool: nope");
    /// assert!(envelope.is_error());
    /// assert_eq!(envelope.first_text(), Some("Unknown tool: nope"));
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        ResponseEnvelope {
            content: vec![Content::Text(message.into())],
            is_error: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn content(&self) -> &[Content] {
        &self.content
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Text of the first fragment, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(Content::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn description_is_omitted_when_absent() {
        let value = serde_json::to_value(ResponseEnvelope::error("boom")).unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["isError"], json!(true));
    }

    #[test]
    fn description_is_serialized_when_present() {
        let envelope = ResponseEnvelope::success(vec![Content::user("hello")])
            .with_description(Some("greeting".to_string()));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["description"], "greeting");
        assert_eq!(value["content"][0]["role"], "user");
    }
}
