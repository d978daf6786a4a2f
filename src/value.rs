//! Tree value produced by the markup parser

use indexmap::map::{IntoIter, Iter, Keys, Values};
use indexmap::IndexMap;
use std::ops::Index;

/// A parsed markup value
///
/// Leaves are always text: the parser never coerces numbers or booleans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Element without attributes and children, or a degraded raw remainder
    Text(String),
    /// Attributes and child elements keyed by name
    Node(Node),
    /// Two or more same-named siblings, in source order
    Sequence(Sequence),
}

impl Default for Value {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Value {
    /// Returns true if this value is text
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns true if this value is a node
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Returns true if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    /// Returns true for the empty text value (an empty element)
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }

    /// Returns the text if this is text, None otherwise
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the node if this is a node, None otherwise
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the sequence if this is a sequence, None otherwise
    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up `key` when this value is a node
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_node().and_then(|node| node.get(key))
    }

    /// Iterates the occurrences this value stands for.
    ///
    /// A sequence yields its items, anything else yields itself once. Useful
    /// for children that may appear once or many times.
    pub fn occurrences(&self) -> std::slice::Iter<'_, Self> {
        match self {
            Self::Sequence(seq) => seq.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Self::Node(value)
    }
}

impl From<Sequence> for Value {
    fn from(value: Sequence) -> Self {
        Self::Sequence(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Sequence(Sequence(values))
    }
}

/// An order-preserving mapping of attribute and child names to values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node(pub(crate) IndexMap<String, Value>);

impl Node {
    /// Creates a new empty node
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Returns the number of keys in the node
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the node has no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a reference to the value bound to `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the node contains `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Binds `key` to `value`, replacing any previous binding in place.
    /// Returns the previous value if the key already existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Adds one occurrence of `key`.
    ///
    /// The first occurrence is stored directly, the second promotes the
    /// binding to a two-element sequence and later ones append to it.
    /// Occurrences are element values (text or node); appending a sequence
    /// as a single occurrence is not distinguishable from a promoted binding.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
            indexmap::map::Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Sequence(seq) => seq.push(value),
                existing => {
                    let first = std::mem::take(existing);
                    *existing = Value::Sequence(Sequence(vec![first, value]));
                }
            },
        }
    }

    /// Removes `key`, preserving the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Returns an iterator over the keys
    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.0.keys()
    }

    /// Returns an iterator over the values
    pub fn values(&self) -> Values<'_, String, Value> {
        self.0.values()
    }

    /// Returns an iterator over key-value pairs
    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl Index<&str> for Node {
    type Output = Value;

    #[allow(clippy::indexing_slicing)]
    fn index(&self, key: &str) -> &Self::Output {
        &self.0[key]
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Node {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<IndexMap<String, Value>> for Node {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Node {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(IndexMap::from_iter(iter))
    }
}

/// Same-named sibling values in source order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence(pub(crate) Vec<Value>);

impl Sequence {
    /// Returns the number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the sequence has no items
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the item at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Returns an iterator over the items
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    fn push(&mut self, value: Value) {
        self.0.push(value);
    }
}

impl Index<usize> for Sequence {
    type Output = Value;

    #[allow(clippy::indexing_slicing)]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Sequence {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(feature = "serde")]
mod ser {
    use super::{Node, Sequence, Value};
    use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Self::Text(s) => serializer.serialize_str(s),
                Self::Node(node) => node.serialize(serializer),
                Self::Sequence(seq) => seq.serialize(serializer),
            }
        }
    }

    impl Serialize for Node {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.len()))?;
            for (key, value) in self {
                map.serialize_entry(key, value)?;
            }
            map.end()
        }
    }

    impl Serialize for Sequence {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(self.len()))?;
            for item in self {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
    }
}
