//! ncparse: turns registrar API markup responses into a generic tree value.
//!
//! The parser understands the small, well-formed subset of XML the registrar
//! API produces: elements, double-quoted attributes, text and a leading
//! `<?xml ... ?>` declaration. It never fails; input it cannot delimit comes
//! back as raw text. Use [`parse_strict`] to treat that as an error instead.
//!
//! # Examples
//! ```
//! use ncparse::{parse, Value};
//!
//! let value = parse(r#"<ApiResponse Status="OK"><Server>PHX01</Server></ApiResponse>"#);
//! let status = value
//!     .get("ApiResponse")
//!     .and_then(|resp| resp.get("Status"))
//!     .and_then(Value::as_text);
//! assert_eq!(status, Some("OK"));
//! ```

#![forbid(unsafe_code)]

use std::path::Path;

use tracing::{debug, instrument};

pub mod envelope;
pub mod error;
pub mod markup;
pub mod value;

pub use envelope::{ApiMessage, Envelope, Status};
pub use error::{Error, ErrorKind, Pos, Result, Span};
pub use markup::{Config, Parser, DEFAULT_TEXT_KEY};
pub use value::{Node, Sequence, Value};

/// Parse a response body into `{RootName: value}`
pub fn parse(input: &str) -> Value {
    Parser::new(input).parse()
}

/// Parse a response body and return the root element's own value
pub fn parse_element(input: &str) -> Value {
    Parser::new(input).parse_element()
}

/// Parse with custom configuration
pub fn parse_with_config(input: &str, config: Config) -> Value {
    Parser::with_config(input, config).parse()
}

/// Parse, failing on the first place the input had to be degraded
pub fn parse_strict(input: &str) -> Result<Value> {
    Parser::new(input).parse_strict()
}

/// Strict parse with custom configuration
pub fn parse_strict_with_config(input: &str, config: Config) -> Result<Value> {
    Parser::with_config(input, config).parse_strict()
}

/// Parse raw response bytes, replacing invalid UTF-8 sequences
pub fn parse_bytes(bytes: &[u8]) -> Value {
    parse(&String::from_utf8_lossy(bytes))
}

/// Read a response body from disk and parse it leniently
#[instrument]
pub fn parse_file(path: &Path) -> Result<Value> {
    debug!("reading response body");
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::with_message(
            ErrorKind::Io(e.to_string()),
            Span::empty(),
            format!("failed to read {}: {e}", path.display()),
        )
    })?;
    Ok(parse(&content))
}
