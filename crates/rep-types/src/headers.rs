//! Multi-valued HTTP header map.
//!
//! Capture agents have shipped three header encodings over time. All of them
//! decode into the same in-memory shape: header name to ordered list of values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Header names mapped to their values, in arrival order.
///
/// Keys keep the spelling the agent sent; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap(BTreeMap<String, Vec<String>>);

/// Legacy `{name, value}` pair encoding.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderPair {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// The wire encodings, tried in declaration order.
#[derive(Deserialize)]
#[serde(
    untagged,
    expecting = "a header map of strings, a header map of string lists, or a list of name/value pairs"
)]
enum HeaderWire {
    Single(BTreeMap<String, String>),
    Multi(BTreeMap<String, Vec<String>>),
    Pairs(Vec<HeaderPair>),
}

impl From<HeaderWire> for HeaderMap {
    fn from(wire: HeaderWire) -> Self {
        match wire {
            HeaderWire::Single(single) => Self(
                single
                    .into_iter()
                    .map(|(name, value)| (name, vec![value]))
                    .collect(),
            ),
            HeaderWire::Multi(multi) => Self(multi),
            HeaderWire::Pairs(pairs) => {
                let mut map = HeaderMap::new();
                for pair in pairs {
                    if pair.name.is_empty() {
                        continue;
                    }
                    map.append(pair.name, pair.value);
                }
                map
            }
        }
    }
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`, keeping any existing values.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Replace all values stored under exactly `name`.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.insert(name.into(), values);
    }

    /// Values for a header name (case-insensitive).
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.values_with_key(name).map(|(_, values)| values)
    }

    /// Stored key spelling and values for a header name (case-insensitive).
    pub fn values_with_key(&self, name: &str) -> Option<(&str, &[String])> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// First value for a header name (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values_with_key(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Vec<String>>> for HeaderMap {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Option::<HeaderWire>::deserialize(deserializer)?;
        Ok(wire.map(HeaderMap::from).unwrap_or_default())
    }
}
