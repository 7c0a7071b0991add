//! JSON-RPC 2.0 protocol types.
//!
//! The transport speaks JSON-RPC 2.0: every inbound frame is either a
//! [`Request`] (has an `id`, expects exactly one [`Response`]) or a
//! [`Notification`] (no `id`, never answered). [`Message::decode`] turns raw
//! frame bytes into one of those, or into a [`Malformed`] describing the
//! protocol-level error to send back.
//!
//! # Examples
//!
//! ```
//! use capdispatch::jrpc::{Message, Response, Error};
//! use serde_json::json;
//!
//! let message = Message::decode(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
//! let Message::Request(request) = message else { panic!("expected a request") };
//! assert_eq!(request.method, "ping");
//!
//! let response: Response<serde_json::Value> = Response::err(Error::method_not_found("ping"), request.id);
//! assert_eq!(response.error.unwrap().code, -32601);
//! ```

use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// A JSON-RPC 2.0 request.
///
/// Represents a method call that expects a response. The `id` is echoed back
/// in the corresponding [`Response`].
///
/// ```
/// use capdispatch::jrpc::Request;
/// use serde_json::json;
///
/// let json_str = r#"{"jsonrpc": "2.0", "method": "tools/list", "id": 99}"#;
/// let request: Request = serde_json::from_str(json_str).unwrap();
/// assert_eq!(request.method, "tools/list");
/// assert_eq!(request.id, json!(99));
/// ```
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct Request {
    /// The JSON-RPC protocol version (must be "2.0")
    pub jsonrpc: String,
    /// The name of the method to invoke
    pub method: String,
    /// Optional parameters for the method call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Unique identifier for this request
    pub id: Value,
}

impl Request {
    /// Creates a new JSON-RPC 2.0 request.
    ///
    /// ```
    /// use capdispatch::jrpc::Request;
    /// use serde_json::json;
    ///
    /// let request = Request::new("tools/call".to_string(), Some(json!({"name": "echo"})), json!(1));
    /// assert_eq!(request.jsonrpc, "2.0");
    /// ```
    pub fn new(method: String, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method,
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 notification.
///
/// A method call without an `id`. The server never answers notifications,
/// not even with an error.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct Notification {
    /// The JSON-RPC protocol version (must be "2.0")
    pub jsonrpc: String,
    /// The name of the method to invoke
    pub method: String,
    /// Optional parameters for the method call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Creates a new JSON-RPC 2.0 notification.
    pub fn new(method: String, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// Contains either a `result` or an `error`, never both. The type parameter
/// `R` is the success payload; [`Response::erase`] converts to a
/// `serde_json::Value` payload so differently-typed handlers can share one
/// return type.
///
/// ```
/// use capdispatch::jrpc::Response;
/// use serde_json::json;
///
/// let response = Response::new(json!(["a", "b"]), json!(7));
/// let json_str = serde_json::to_string(&response).unwrap();
/// assert!(json_str.contains("\"result\""));
/// assert!(!json_str.contains("\"error\""));
/// ```
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Response<R> {
    /// The JSON-RPC protocol version (must be "2.0")
    pub jsonrpc: String,
    /// The result of the method call (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    /// Error information if the method call failed (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
    /// The same identifier that was in the request
    pub id: Value,
}

impl<R> Response<R> {
    /// Creates a successful response with the given result.
    pub fn new(result: R, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Creates an error response with the given error.
    pub fn err(e: Error, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(e),
            id,
        }
    }

    /// Converts a typed response into a response with a `serde_json::Value` result.
    ///
    /// If the result cannot be represented as JSON the response becomes an
    /// internal error (-32603) instead.
    ///
    /// ```
    /// use capdispatch::jrpc::Response;
    /// use serde_json::json;
    ///
    /// #[derive(serde::Serialize)]
    /// struct Pong { ok: bool }
    ///
    /// let erased = Response::new(Pong { ok: true }, json!(1)).erase();
    /// assert_eq!(erased.result.unwrap()["ok"], json!(true));
    /// ```
    pub fn erase(self) -> Response<Value>
    where
        R: Serialize,
    {
        match self.result.map(serde_json::to_value).transpose() {
            Ok(result) => Response {
                jsonrpc: self.jsonrpc,
                result,
                error: self.error,
                id: self.id,
            },
            Err(e) => Response::err(Error::from_error(e), self.id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// # Standard Error Codes
///
/// * `-32700` - Parse error (invalid JSON)
/// * `-32600` - Invalid Request
/// * `-32601` - Method not found
/// * `-32602` - Invalid params
/// * `-32603` - Internal error
///
/// ```
/// use capdispatch::jrpc::Error;
///
/// let error = Error::invalid_params("missing field `name`".to_string());
/// assert_eq!(error.code, -32602);
/// assert!(error.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Error {
    /// Error code as defined in JSON-RPC 2.0 specification
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional information about the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates a "Parse error" (code -32700).
    pub fn parse_error(detail: String) -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
            data: Some(detail.into()),
        }
    }

    /// Creates an "Invalid Request" error (code -32600).
    pub fn invalid_request(detail: String) -> Self {
        Self {
            code: -32600,
            message: "Invalid Request".to_string(),
            data: Some(detail.into()),
        }
    }

    /// Creates a "Method not found" error (code -32601) naming the method.
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    /// Creates an "Invalid params" error (code -32602) with additional details.
    pub fn invalid_params(detail: String) -> Self {
        Self {
            code: -32602,
            message: "Invalid params".to_string(),
            data: Some(detail.into()),
        }
    }

    /// Creates an "Internal error" (code -32603) from a standard Rust error.
    pub fn from_error<E: std::error::Error>(error: E) -> Self {
        Self {
            code: -32603,
            message: error.to_string(),
            data: None,
        }
    }
}

/// An inbound frame that failed protocol-level decoding.
///
/// `id` is the request id when it could be recovered, otherwise `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Malformed {
    pub error: Error,
    pub id: Value,
}

impl Malformed {
    fn new(error: Error, id: Value) -> Self {
        Malformed { error, id }
    }

    /// The error response to write back for this frame.
    pub fn into_response(self) -> Response<Value> {
        Response::err(self.error, self.id)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Notification(Notification),
}

impl Message {
    /// Decodes one frame.
    ///
    /// Batches (JSON arrays) are not supported and are rejected as invalid
    /// requests.
    ///
    /// ```
    /// use capdispatch::jrpc::Message;
    ///
    /// assert!(matches!(
    ///     Message::decode(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
    ///     Ok(Message::Notification(_))
    /// ));
    /// assert_eq!(Message::decode(b"{not json").unwrap_err().error.code, -32700);
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Message, Malformed> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Malformed::new(Error::parse_error(e.to_string()), Value::Null))?;
        let Value::Object(mut object) = value else {
            return Err(Malformed::new(
                Error::invalid_request("expected a JSON object".to_string()),
                Value::Null,
            ));
        };

        let id = object.remove("id");
        let reply_id = match &id {
            Some(id @ (Value::String(_) | Value::Number(_) | Value::Null)) => id.clone(),
            Some(_) => {
                return Err(Malformed::new(
                    Error::invalid_request("id must be a string, number or null".to_string()),
                    Value::Null,
                ));
            }
            None => Value::Null,
        };

        match object.get("jsonrpc") {
            Some(Value::String(version)) if version == "2.0" => {}
            _ => {
                return Err(Malformed::new(
                    Error::invalid_request("jsonrpc must be \"2.0\"".to_string()),
                    reply_id,
                ));
            }
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => {
                return Err(Malformed::new(
                    Error::invalid_request("method must be a string".to_string()),
                    reply_id,
                ));
            }
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => None,
            Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
            Some(_) => {
                return Err(Malformed::new(
                    Error::invalid_request("params must be an object or array".to_string()),
                    reply_id,
                ));
            }
        };

        Ok(match id {
            Some(id) => Message::Request(Request::new(method, params, id)),
            None => Message::Notification(Notification::new(method, params)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_request_keeps_id_and_params() {
        let message =
            Message::decode(br#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"echo"}}"#)
                .unwrap();
        match message {
            Message::Request(request) => {
                assert_eq!(request.id, json!("a"));
                assert_eq!(request.params, Some(json!({"name": "echo"})));
            }
            Message::Notification(_) => panic!("expected request"),
        }
    }

    #[test]
    fn decode_rejects_wrong_version_with_recovered_id() {
        let err = Message::decode(br#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.code, -32600);
        assert_eq!(err.id, json!(5));
    }

    #[test]
    fn decode_rejects_missing_method() {
        let err = Message::decode(br#"{"jsonrpc":"2.0","id":5}"#).unwrap_err();
        assert_eq!(err.error.code, -32600);
    }

    #[test]
    fn decode_rejects_batches_and_scalars() {
        assert_eq!(Message::decode(b"[]").unwrap_err().error.code, -32600);
        assert_eq!(Message::decode(b"42").unwrap_err().id, Value::Null);
    }

    #[test]
    fn decode_rejects_object_id() {
        let err = Message::decode(br#"{"jsonrpc":"2.0","id":{},"method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.code, -32600);
        assert_eq!(err.id, Value::Null);
    }

    #[test]
    fn decode_rejects_scalar_params() {
        let err = Message::decode(br#"{"jsonrpc":"2.0","id":1,"method":"ping","params":3}"#).unwrap_err();
        assert_eq!(err.error.code, -32600);
        assert_eq!(err.id, json!(1));
    }

    #[test]
    fn error_response_omits_result() {
        let response: Response<Value> = Response::err(Error::method_not_found("bogus"), json!(2));
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["error"]["message"], "Method not found: bogus");
    }
}
