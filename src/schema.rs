//! Declared input shapes and the validator that checks arguments against them.
//!
//! A capability declares its accepted arguments as an [`InputSchema`], which
//! serializes as a JSON Schema object (`type`, `properties`, `required`).
//! Before a handler runs, [`InputSchema::validate`] checks that every required
//! argument is present and that every declared argument has the declared type.
//!
//! # Examples
//!
//! ```
//! use capdispatch::schema::{Argument, ArgumentType, InputSchema};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let schema = InputSchema::new(vec![
//!     Argument::required("text", ArgumentType::String, "Text to echo"),
//!     Argument::optional("repeat", ArgumentType::Integer, "How many times"),
//! ]);
//!
//! let mut args = HashMap::new();
//! args.insert("text".to_string(), json!("hi"));
//! assert!(schema.validate(&args).is_ok());
//!
//! args.insert("repeat".to_string(), json!("twice"));
//! let violations = schema.validate(&args).unwrap_err();
//! assert_eq!(violations[0].field, "repeat");
//! ```

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

/// Arguments of a capability request, keyed by argument name.
pub type Arguments = HashMap<String, Value>;

/// The declared type of one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// A string restricted to the listed values
    Enum(Vec<String>),
}

impl ArgumentType {
    /// The JSON Schema `type` keyword for this argument type.
    pub fn json_type(&self) -> &'static str {
        match self {
            ArgumentType::String | ArgumentType::Enum(_) => "string",
            ArgumentType::Number => "number",
            ArgumentType::Integer => "integer",
            ArgumentType::Boolean => "boolean",
            ArgumentType::Object => "object",
            ArgumentType::Array => "array",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ArgumentType::String | ArgumentType::Enum(_) => value.is_string(),
            ArgumentType::Number => value.is_number(),
            ArgumentType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value
                        .as_f64()
                        .is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            ArgumentType::Boolean => value.is_boolean(),
            ArgumentType::Object => value.is_object(),
            ArgumentType::Array => value.is_array(),
        }
    }
}

/// A single declared argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    name: String,
    r#type: ArgumentType,
    description: String,
    required: bool,
}

impl Argument {
    /// Creates a new argument specification.
    ///
    /// ```
    /// use capdispatch::schema::{Argument, ArgumentType};
    ///
    /// let arg = Argument::new("path", ArgumentType::String, "Path to the file", true);
    /// assert!(arg.is_required());
    /// ```
    pub fn new(
        name: impl Into<String>,
        r#type: ArgumentType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            r#type,
            description: description.into(),
            required,
        }
    }

    pub fn required(name: impl Into<String>, r#type: ArgumentType, description: impl Into<String>) -> Self {
        Self::new(name, r#type, description, true)
    }

    pub fn optional(name: impl Into<String>, r#type: ArgumentType, description: impl Into<String>) -> Self {
        Self::new(name, r#type, description, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument_type(&self) -> &ArgumentType {
        &self.r#type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// What was wrong with one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    /// A required argument was absent or `null`
    Missing,
    /// The value had the wrong JSON type
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    /// A string outside the declared enum values
    NotAllowed { value: String, allowed: Vec<String> },
}

/// One violated field, as reported by [`InputSchema::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field: String,
    pub problem: Problem,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.problem {
            Problem::Missing => write!(f, "{}: missing required argument", self.field),
            Problem::WrongType { expected, found } => {
                write!(f, "{}: expected {expected}, found {found}", self.field)
            }
            Problem::NotAllowed { value, allowed } => write!(
                f,
                "{}: {value:?} is not one of [{}]",
                self.field,
                allowed.join(", ")
            ),
        }
    }
}

/// The declared input shape of a capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    arguments: Vec<Argument>,
}

impl InputSchema {
    /// Creates a schema from argument declarations. Declaration order is
    /// the order in which violations are reported.
    pub fn new<A: IntoIterator<Item = Argument>>(arguments: A) -> Self {
        InputSchema {
            arguments: arguments.into_iter().collect(),
        }
    }

    /// A schema that accepts no declared arguments.
    pub fn empty() -> Self {
        InputSchema::default()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Checks `args` against this schema without modifying them.
    ///
    /// Returns every violation found, one per offending field. Optional
    /// arguments given as `null` count as absent; undeclared arguments are
    /// accepted.
    pub fn validate(&self, args: &Arguments) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        for argument in &self.arguments {
            let value = match args.get(&argument.name) {
                None | Some(Value::Null) => {
                    if argument.required {
                        violations.push(Violation {
                            field: argument.name.clone(),
                            problem: Problem::Missing,
                        });
                    }
                    continue;
                }
                Some(value) => value,
            };
            if !argument.r#type.accepts(value) {
                violations.push(Violation {
                    field: argument.name.clone(),
                    problem: Problem::WrongType {
                        expected: argument.r#type.json_type(),
                        found: json_type_name(value),
                    },
                });
                continue;
            }
            if let (ArgumentType::Enum(allowed), Some(value)) = (&argument.r#type, value.as_str()) {
                if !allowed.iter().any(|a| a == value) {
                    violations.push(Violation {
                        field: argument.name.clone(),
                        problem: Problem::NotAllowed {
                            value: value.to_string(),
                            allowed: allowed.clone(),
                        },
                    });
                }
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(serde::Serialize)]
struct PropertySchema<'a> {
    r#type: &'static str,
    description: &'a str,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    allowed: Option<&'a [String]>,
}

impl Serialize for InputSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let properties: BTreeMap<&str, PropertySchema<'_>> = self
            .arguments
            .iter()
            .map(|argument| {
                let allowed = match &argument.r#type {
                    ArgumentType::Enum(values) => Some(values.as_slice()),
                    _ => None,
                };
                (
                    argument.name.as_str(),
                    PropertySchema {
                        r#type: argument.r#type.json_type(),
                        description: &argument.description,
                        allowed,
                    },
                )
            })
            .collect();
        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|argument| argument.required)
            .map(|argument| argument.name.as_str())
            .collect();

        let mut s = serializer.serialize_struct("InputSchema", 3)?;
        s.serialize_field("type", "object")?;
        s.serialize_field("properties", &properties)?;
        s.serialize_field("required", &required)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    fn schema() -> InputSchema {
        InputSchema::new(vec![
            Argument::required("text", ArgumentType::String, "text"),
            Argument::optional("loud", ArgumentType::Boolean, "uppercase"),
            Argument::optional(
                "mode",
                ArgumentType::Enum(vec!["plain".to_string(), "quoted".to_string()]),
                "rendering",
            ),
            Argument::optional("count", ArgumentType::Integer, "count"),
            Argument::optional("tags", ArgumentType::Array, "tags"),
            Argument::optional("meta", ArgumentType::Object, "meta"),
        ])
    }

    #[test]
    fn accepts_conforming_arguments() {
        let ok = args(json!({
            "text": "hi", "loud": true, "mode": "quoted", "count": 3,
            "tags": ["a"], "meta": {"k": 1}
        }));
        assert_eq!(schema().validate(&ok), Ok(()));
    }

    #[test]
    fn missing_required_names_the_field() {
        let violations = schema().validate(&args(json!({}))).unwrap_err();
        assert_eq!(
            violations,
            vec![Violation {
                field: "text".to_string(),
                problem: Problem::Missing
            }]
        );
        assert_eq!(violations[0].to_string(), "text: missing required argument");
    }

    #[test]
    fn null_required_is_missing_and_null_optional_is_absent() {
        let violations = schema()
            .validate(&args(json!({"text": null, "loud": null})))
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].problem, Problem::Missing);
    }

    #[test]
    fn reports_every_wrong_type_in_declaration_order() {
        let violations = schema()
            .validate(&args(json!({"text": 1, "loud": "yes", "count": 1.5})))
            .unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, ["text", "loud", "count"]);
        assert_eq!(violations[2].to_string(), "count: expected integer, found number");
    }

    #[test]
    fn integer_accepts_whole_floats() {
        assert!(schema().validate(&args(json!({"text": "x", "count": 2.0}))).is_ok());
    }

    #[test]
    fn enum_rejects_unlisted_value() {
        let violations = schema()
            .validate(&args(json!({"text": "x", "mode": "shouty"})))
            .unwrap_err();
        assert_eq!(violations[0].field, "mode");
        assert!(violations[0].to_string().contains("plain, quoted"));
    }

    #[test]
    fn extra_arguments_are_accepted_and_input_untouched() {
        let input = args(json!({"text": "x", "unexpected": [1, 2]}));
        let before = input.clone();
        assert!(schema().validate(&input).is_ok());
        assert_eq!(input, before);
    }

    #[test]
    fn serializes_as_json_schema() {
        let value = serde_json::to_value(schema()).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["required"], json!(["text"]));
        assert_eq!(value["properties"]["mode"]["type"], "string");
        assert_eq!(value["properties"]["mode"]["enum"], json!(["plain", "quoted"]));
        assert!(value["properties"]["text"].get("enum").is_none());
    }
}
