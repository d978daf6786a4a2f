//! Reading the registrar's `ApiResponse` envelope out of a parsed value.
//!
//! The parser itself accepts anything. This layer is where an unexpected
//! shape (including a degraded text result) becomes an error.

use crate::error::{Error, ErrorKind, Result};
use crate::markup::DEFAULT_TEXT_KEY;
use crate::value::{Node, Value};

const ROOT: &str = "ApiResponse";

/// Value of the envelope's `Status` attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Other(String),
}

impl Status {
    fn from_attr(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("ok") {
            Self::Ok
        } else if raw.eq_ignore_ascii_case("error") {
            Self::Error
        } else {
            Self::Other(raw.to_string())
        }
    }
}

/// An `<Error>` or `<Warning>` entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiMessage {
    pub number: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.number {
            Some(number) => write!(f, "{number}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// The common wrapper around every registrar response
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub status: Status,
    pub errors: Vec<ApiMessage>,
    pub warnings: Vec<ApiMessage>,
    pub requested_command: Option<String>,
    /// `Type` attribute of `CommandResponse`
    pub command_type: Option<String>,
    pub command_response: Option<Value>,
    pub server: Option<String>,
    pub gmt_time_difference: Option<String>,
    pub execution_time: Option<String>,
}

impl Envelope {
    /// Parse `input` leniently and read its envelope
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_value(&crate::parse(input))
    }

    /// Read the envelope from a value produced with the default text key
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::from_value_with_text_key(value, DEFAULT_TEXT_KEY)
    }

    pub fn from_value_with_text_key(value: &Value, text_key: &str) -> Result<Self> {
        let root = value
            .get(ROOT)
            .and_then(Value::as_node)
            .ok_or_else(|| Error::unlocated(ErrorKind::NotAnEnvelope))?;

        let status = root
            .get("Status")
            .and_then(Value::as_text)
            .map(Status::from_attr)
            .ok_or_else(|| missing("Status"))?;

        let command_response = root.get("CommandResponse").cloned();
        let command_type = command_response
            .as_ref()
            .and_then(|resp| resp.get("Type"))
            .and_then(Value::as_text)
            .map(str::to_string);

        Ok(Self {
            status,
            errors: messages(root, "Errors", "Error", text_key),
            warnings: messages(root, "Warnings", "Warning", text_key),
            requested_command: child_text(root, "RequestedCommand"),
            command_type,
            command_response,
            server: child_text(root, "Server"),
            gmt_time_difference: child_text(root, "GMTTimeDifference"),
            execution_time: child_text(root, "ExecutionTime"),
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Fails with [`ErrorKind::ApiError`] when the status is not `OK`
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            return Ok(self);
        }
        let mut messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        if let Status::Other(status) = &self.status {
            messages.insert(0, format!("unexpected status {status}"));
        }
        Err(Error::unlocated(ErrorKind::ApiError { messages }))
    }

    /// Checks that the response answers `command` (e.g. `namecheap.domains.check`)
    pub fn expect_command(&self, command: &str) -> Result<()> {
        let found = self
            .command_type
            .as_deref()
            .or(self.requested_command.as_deref())
            .ok_or_else(|| missing("CommandResponse"))?;
        if found.eq_ignore_ascii_case(command) {
            Ok(())
        } else {
            Err(Error::unlocated(ErrorKind::CommandMismatch {
                expected: command.to_string(),
                found: found.to_string(),
            }))
        }
    }
}

fn missing(field: &str) -> Error {
    Error::unlocated(ErrorKind::MissingField {
        field: field.to_string(),
    })
}

fn child_text(node: &Node, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_text)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Collects `<container><entry Number="..">text</entry>...</container>`
fn messages(root: &Node, container: &str, entry: &str, text_key: &str) -> Vec<ApiMessage> {
    let Some(entries) = root.get(container).and_then(|c| c.get(entry)) else {
        return Vec::new();
    };
    entries
        .occurrences()
        .map(|occurrence| match occurrence {
            Value::Node(node) => ApiMessage {
                number: node
                    .get("Number")
                    .and_then(Value::as_text)
                    .map(str::to_string),
                message: node
                    .get(text_key)
                    .and_then(Value::as_text)
                    .unwrap_or_default()
                    .to_string(),
            },
            other => ApiMessage {
                number: None,
                message: other.as_text().unwrap_or_default().to_string(),
            },
        })
        .collect()
}
