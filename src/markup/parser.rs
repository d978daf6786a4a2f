//! Markup parser implementation
//!
//! A recursive-descent parser over an immutable `&str`. Each element is
//! delimited with [`scan::find_matching_close`], then its inner content is
//! either pure text or decomposed into children, each parsed recursively.
//!
//! Parsing never fails. Wherever the input cannot be understood the parser
//! keeps the raw text instead and records a degradation, which
//! [`Parser::parse_strict`] turns into an error.

use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Locator, Result};
use crate::markup::scan::{self, OpenTag};
use crate::value::{Node, Value};

/// Key holding element text that coexists with attributes or children
pub const DEFAULT_TEXT_KEY: &str = "#text";

/// Parser configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum element nesting depth (0 means unlimited)
    pub max_depth: u16,
    /// Maximum input size in bytes (0 means unlimited)
    pub max_size: usize,
    /// Reserved key for text content inside a node
    pub text_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_size: 10 * 1024 * 1024, // 10 MB default
            text_key: DEFAULT_TEXT_KEY.to_string(),
        }
    }
}

impl Config {
    /// Create a new config with unlimited depth and size
    pub fn unlimited() -> Self {
        Self::new(0, 0)
    }

    /// Create a new config with specific limits
    pub fn new(max_depth: u16, max_size: usize) -> Self {
        Self {
            max_depth,
            max_size,
            ..Self::default()
        }
    }

    /// Use `key` as the reserved text key
    pub fn with_text_key(mut self, key: impl Into<String>) -> Self {
        self.text_key = key.into();
        self
    }
}

/// Outcome of locating the root element
enum Root<'a> {
    /// Nothing to parse
    Empty,
    /// Input that could not be delimited, returned as-is
    Raw(Value),
    Element { name: &'a str, value: Value },
}

/// Markup parser
#[derive(Debug)]
pub struct Parser<'a> {
    source: &'a str,
    config: Config,
    degradations: Vec<Error>,
    locator: Locator<'a>,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the default configuration
    pub fn new(source: &'a str) -> Self {
        Self::with_config(source, Config::default())
    }

    /// Create a new parser with a custom configuration
    pub fn with_config(source: &'a str, config: Config) -> Self {
        Self {
            source,
            config,
            degradations: Vec::new(),
            locator: Locator::new(source),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Places where the last parse fell back to raw text or skipped content
    pub fn degradations(&self) -> &[Error] {
        &self.degradations
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Parse the document into a node keyed by the root element's name.
    ///
    /// Empty input yields empty text; input whose root cannot be delimited
    /// yields the raw remainder as text.
    pub fn parse(&mut self) -> Value {
        match self.root() {
            Root::Empty => Value::default(),
            Root::Raw(value) => value,
            Root::Element { name, value } => {
                let mut node = Node::new();
                node.insert(name, value);
                Value::Node(node)
            }
        }
    }

    /// Parse the document and return the root element's own value
    pub fn parse_element(&mut self) -> Value {
        match self.root() {
            Root::Empty => Value::default(),
            Root::Raw(value) | Root::Element { value, .. } => value,
        }
    }

    /// Like [`Parser::parse`], but fails on the first degradation
    pub fn parse_strict(&mut self) -> Result<Value> {
        let value = self.parse();
        match self.degradations.first() {
            Some(err) => Err(err.clone()),
            None => Ok(value),
        }
    }

    fn root(&mut self) -> Root<'a> {
        self.degradations.clear();
        trace!(len = self.source.len(), "parsing markup");

        if self.config.max_size > 0 && self.source.len() > self.config.max_size {
            let max = self.config.max_size;
            self.degrade(ErrorKind::MaxSizeExceeded { max }, 0, self.source.len());
            return Root::Raw(Value::Text(self.source.trim().to_string()));
        }

        let Some(start) = self.body_start() else {
            return Root::Raw(Value::Text(self.source.trim().to_string()));
        };
        let end = start + self.slice(start, self.source.len()).trim_end().len();
        if start >= end {
            return Root::Empty;
        }

        let body = self.slice(start, end);
        let Some(tag) = scan::match_open_tag(body) else {
            self.degrade(ErrorKind::MalformedTag, start, end);
            return Root::Raw(Value::Text(body.to_string()));
        };

        match self.element(&tag, start, end, 1) {
            Some((value, consumed)) => {
                if !self.slice(consumed, end).trim().is_empty() {
                    self.degrade(ErrorKind::TrailingContent, consumed, end);
                }
                Root::Element {
                    name: tag.name,
                    value,
                }
            }
            None => Root::Raw(Value::Text(body.to_string())),
        }
    }

    /// Offset of the first structural byte, past any BOM, whitespace and
    /// declaration. `None` when the declaration is unterminated.
    fn body_start(&mut self) -> Option<usize> {
        let leading = self
            .source
            .trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace());
        let offset = self.source.len() - leading.len();

        let Some(rest) = scan::strip_prologue(leading) else {
            self.degrade(ErrorKind::UnterminatedPrologue, offset, self.source.len());
            return None;
        };
        Some(self.source.len() - rest.trim_start().len())
    }

    /// Parses the element whose opening `tag` starts at `at`, searching for
    /// its closing tag before `limit`.
    ///
    /// Returns the element's value and the offset just past it, or `None`
    /// when the element is never closed.
    fn element(
        &mut self,
        tag: &OpenTag<'a>,
        at: usize,
        limit: usize,
        depth: u16,
    ) -> Option<(Value, usize)> {
        let open_end = at + tag.len;
        if tag.self_closing {
            return Some((attributes_value(tag.attrs), open_end));
        }

        let Some(close) = scan::find_matching_close(self.slice(open_end, limit), tag.name) else {
            let name = tag.name.to_string();
            self.degrade(ErrorKind::UnclosedTag { name }, at, open_end);
            return None;
        };
        let inner_end = open_end + close.start;
        let end = open_end + close.end;

        if self.config.max_depth > 0 && depth > self.config.max_depth {
            let max = self.config.max_depth;
            self.degrade(ErrorKind::MaxDepthExceeded { max }, at, end);
            return Some((Value::Text(self.slice(at, end).to_string()), end));
        }

        Some((self.content(tag.attrs, open_end, inner_end, depth), end))
    }

    /// Builds an element's value from its attribute span and inner content
    fn content(&mut self, attrs: &'a str, start: usize, end: usize, depth: u16) -> Value {
        let mut node = Node::new();
        for (name, value) in scan::attributes(attrs) {
            node.insert(name, value);
        }

        let text = self.slice(start, end).trim();
        if text.is_empty() {
            return if node.is_empty() {
                Value::default()
            } else {
                Value::Node(node)
            };
        }
        if !text.contains('<') {
            if node.is_empty() {
                return Value::Text(text.to_string());
            }
            node.insert(self.config.text_key.as_str(), text);
            return Value::Node(node);
        }

        self.children(&mut node, attrs, start, end, depth);
        Value::Node(node)
    }

    /// Decomposes `start..end` into child elements merged into `node`
    fn children(&mut self, node: &mut Node, attrs: &'a str, start: usize, end: usize, depth: u16) {
        let mut attribute_names: Vec<&str> = scan::attributes(attrs).map(|(name, _)| name).collect();
        let mut pos = start;

        while pos < end {
            let rest = self.slice(pos, end);
            pos += rest.len() - rest.trim_start().len();
            let rest = self.slice(pos, end);
            if rest.is_empty() {
                break;
            }

            if !rest.starts_with('<') {
                let text_end = rest.find('<').map_or(end, |idx| pos + idx);
                self.capture_text(node, pos, text_end);
                pos = text_end;
                continue;
            }

            let Some(tag) = scan::match_open_tag(rest) else {
                // stray markup such as a lone closing tag is kept as text
                self.degrade(ErrorKind::MalformedTag, pos, pos + 1);
                let text_end = rest
                    .get(1..)
                    .and_then(|after| after.find('<'))
                    .map_or(end, |idx| pos + 1 + idx);
                self.capture_text(node, pos, text_end);
                pos = text_end;
                continue;
            };

            match self.element(&tag, pos, end, depth.saturating_add(1)) {
                Some((value, next)) => {
                    merge_child(node, &mut attribute_names, tag.name, value);
                    pos = next;
                }
                None => {
                    let raw = Value::Text(rest.trim_end().to_string());
                    merge_child(node, &mut attribute_names, tag.name, raw);
                    break;
                }
            }
        }
    }

    /// Stores the first non-blank stray text under the reserved key
    fn capture_text(&self, node: &mut Node, start: usize, end: usize) {
        let text = self.slice(start, end).trim();
        if !text.is_empty() && !node.contains_key(&self.config.text_key) {
            node.insert(self.config.text_key.as_str(), text);
        }
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.source.get(start..end).unwrap_or_default()
    }

    fn degrade(&mut self, kind: ErrorKind, start: usize, end: usize) {
        let err = Error::new(kind, self.locator.span(start, end));
        debug!(error = %err, "markup degraded to raw text");
        self.degradations.push(err);
    }
}

/// Node of the attributes in `span`, or empty text when there are none
fn attributes_value(span: &str) -> Value {
    let node: Node = scan::attributes(span)
        .map(|(name, value)| (name.to_string(), Value::from(value)))
        .collect();
    if node.is_empty() {
        Value::default()
    } else {
        Value::Node(node)
    }
}

/// Merges one child occurrence into its parent node.
///
/// A child named like one of the parent's attributes replaces that
/// attribute; afterwards same-named children accumulate as usual.
fn merge_child(node: &mut Node, attribute_names: &mut Vec<&str>, name: &str, value: Value) {
    if let Some(idx) = attribute_names.iter().position(|attr| *attr == name) {
        attribute_names.swap_remove(idx);
        node.insert(name, value);
    } else {
        node.append(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    fn node(pairs: &[(&str, Value)]) -> Value {
        Value::Node(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.max_depth, 128);
        assert_eq!(config.max_size, 10 * 1024 * 1024);
        assert_eq!(config.text_key, "#text");
    }

    #[test]
    fn test_config_unlimited() {
        let config = Config::unlimited();
        assert_eq!(config.max_depth, 0);
        assert_eq!(config.max_size, 0);
        assert_eq!(config.text_key, DEFAULT_TEXT_KEY);
    }

    #[test]
    fn test_config_text_key() {
        let config = Config::new(8, 1024).with_text_key("_text");
        let mut parser = Parser::with_config(r#"<T A="1">hi</T>"#, config);
        assert_eq!(
            parser.parse_element(),
            node(&[("A", text("1")), ("_text", text("hi"))])
        );
    }

    #[test]
    fn test_parse_wraps_root_name() {
        let mut parser = Parser::new("<Server>PHX01</Server>");
        assert_eq!(parser.parse(), node(&[("Server", text("PHX01"))]));
        assert!(!parser.is_degraded());
    }

    #[test]
    fn test_mixed_text_first_occurrence_wins() {
        let mut parser = Parser::new("<P>lead<C>1</C>middle<C>2</C>tail</P>");
        assert_eq!(
            parser.parse_element(),
            node(&[
                ("#text", text("lead")),
                ("C", Value::from(vec![text("1"), text("2")])),
            ])
        );
    }

    #[test]
    fn test_attribute_child_collision_overwrites() {
        let mut parser = Parser::new(r#"<P Name="attr"><Name>child</Name></P>"#);
        assert_eq!(parser.parse_element(), node(&[("Name", text("child"))]));

        let mut parser = Parser::new(r#"<P Name="attr"><Name>a</Name><Name>b</Name></P>"#);
        assert_eq!(
            parser.parse_element(),
            node(&[("Name", Value::from(vec![text("a"), text("b")]))])
        );
    }

    #[test]
    fn test_same_name_nesting() {
        let mut parser = Parser::new("<a><a>inner</a><b>x</b></a>");
        assert_eq!(
            parser.parse(),
            node(&[("a", node(&[("a", text("inner")), ("b", text("x"))]))])
        );
    }

    #[test]
    fn test_unclosed_child_keeps_raw_remainder() {
        let mut parser = Parser::new("<a><ok>1</ok><broken>x <c>2</c> </a>");
        let value = parser.parse_element();
        assert_eq!(
            value,
            node(&[("ok", text("1")), ("broken", text("<broken>x <c>2</c>"))])
        );
        assert!(matches!(
            parser.degradations().first().map(Error::kind),
            Some(ErrorKind::UnclosedTag { name }) if name == "broken"
        ));
    }

    #[test]
    fn test_stray_closing_tag_is_text() {
        let mut parser = Parser::new("<a><b>1</b></c></a>");
        assert_eq!(
            parser.parse_element(),
            node(&[("b", text("1")), ("#text", text("</c>"))])
        );
        assert!(parser.parse_strict().is_err());
    }

    #[test]
    fn test_max_depth_keeps_raw_element() {
        let config = Config::new(2, 0);
        let mut parser = Parser::with_config("<a><b><c>deep</c></b></a>", config);
        assert_eq!(
            parser.parse(),
            node(&[("a", node(&[("b", node(&[("c", text("<c>deep</c>"))]))]))])
        );
        let err = parser.parse_strict().err();
        assert!(matches!(
            err.as_ref().map(Error::kind),
            Some(ErrorKind::MaxDepthExceeded { max: 2 })
        ));
    }

    #[test]
    fn test_max_size_returns_raw_text() {
        let config = Config::new(0, 8);
        let mut parser = Parser::with_config("  <Status>OK</Status>  ", config);
        assert_eq!(parser.parse(), text("<Status>OK</Status>"));
        assert!(matches!(
            parser.degradations().first().map(Error::kind),
            Some(ErrorKind::MaxSizeExceeded { max: 8 })
        ));
    }

    #[test]
    fn test_unterminated_prologue() {
        let mut parser = Parser::new(r#"<?xml version="1.0" <a/>"#);
        assert_eq!(parser.parse(), text(r#"<?xml version="1.0" <a/>"#));
        let err = parser.parse_strict().err();
        assert!(matches!(
            err.as_ref().map(Error::kind),
            Some(ErrorKind::UnterminatedPrologue)
        ));
    }

    #[test]
    fn test_trailing_content_is_ignored_leniently() {
        let mut parser = Parser::new("<a>1</a> junk");
        assert_eq!(parser.parse(), node(&[("a", text("1"))]));
        let err = parser.parse_strict().err();
        assert!(matches!(
            err.as_ref().map(Error::kind),
            Some(ErrorKind::TrailingContent)
        ));
    }

    #[test]
    fn test_degradation_position() {
        let mut parser = Parser::new("<a>\n  <b>open\n</a>");
        let _ = parser.parse();
        let span = parser.degradations().first().map(Error::span);
        assert_eq!(span.map(|s| (s.start.line, s.start.col)), Some((2, 3)));
    }

    #[test]
    fn test_reparse_clears_degradations() {
        let mut parser = Parser::new("<a>1</a>");
        assert!(parser.parse_strict().is_ok());
        assert!(parser.parse_strict().is_ok());
        assert!(parser.degradations().is_empty());
    }
}
