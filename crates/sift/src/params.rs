//! Flat, ordered request parameter mapping.
//!
//! The HTTP layer is an external collaborator: it hands the engine a
//! sequence of `(name, value)` pairs in request order. `parse_query` is a
//! convenience constructor for tests and diagnostics; it is not a full
//! query-string codec.

use crate::error::{QueryError, QueryResult};

/// A query-string parameter value: a single scalar or a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    /// The scalar value, if this is one.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            ParamValue::List(_) => None,
        }
    }

    /// All carried values in order; a scalar yields one element.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Scalar(s) => vec![s.as_str()],
            ParamValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Whether this value carries nothing usable (empty string or list).
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Scalar(s) => s.is_empty(),
            ParamValue::List(items) => items.is_empty(),
        }
    }
}

/// Ordered request parameters.
///
/// Order is preserved because clause application walks parameters in
/// request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar parameter.
    pub fn push_scalar(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries
            .push((name.into(), ParamValue::Scalar(value.into())));
        self
    }

    /// Append a list parameter.
    pub fn push_list<I, S>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values.into_iter().map(Into::into).collect();
        self.entries.push((name.into(), ParamValue::List(items)));
        self
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    ///
    /// Repeated `name[]` pairs collapse into a single `List` entry at the
    /// position of the first occurrence, matching how PHP-style servers
    /// present array parameters to their handlers.
    pub fn parse_query(query: &str) -> Self {
        let mut params = Params::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_name, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = decode(raw_name);
            let value = decode(raw_value);
            if name.ends_with("[]") {
                if let Some((_, ParamValue::List(items))) =
                    params.entries.iter_mut().find(|(n, _)| *n == name)
                {
                    items.push(value);
                } else {
                    params.entries.push((name, ParamValue::List(vec![value])));
                }
            } else {
                params.entries.push((name, ParamValue::Scalar(value)));
            }
        }
        params
    }

    /// First value registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// First scalar registered under `name`.
    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_scalar)
    }

    /// All values registered under `name` or `name[]`, flattened in order.
    /// Used for repeatable parameters such as `with[]`.
    pub fn all(&self, name: &str) -> Vec<&str> {
        let bracketed = format!("{name}[]");
        self.entries
            .iter()
            .filter(|(n, _)| n == name || *n == bracketed)
            .flat_map(|(_, v)| v.values())
            .collect()
    }

    /// Parse the first scalar under `name` as an unsigned integer.
    /// A present but non-numeric value is a malformed parameter.
    pub fn unsigned(&self, name: &str) -> QueryResult<Option<u64>> {
        match self.scalar(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| QueryError::MalformedParameter {
                    name: name.to_string(),
                    reason: format!("expected an unsigned integer, got '{raw}'"),
                }),
        }
    }

    /// Iterate all entries in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn decode(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}
