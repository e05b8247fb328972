//! Core data types exchanged with the remote server.

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned by the server to a record.
pub type RecordId = i64;

/// A record as returned by `read`/`search_read`: field name to value.
pub type Record = BTreeMap<String, Value>;

/// A value on the XML-RPC wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(NaiveDateTime),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Build an empty struct value.
    pub fn empty_struct() -> Self {
        Value::Struct(BTreeMap::new())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Truthiness as the server understands it: `False`, `0`, empty text
    /// and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::DateTime(_) => true,
            Value::Base64(bytes) => !bytes.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Struct(members) => !members.is_empty(),
        }
    }

    /// Interpret a many2one field (`[id, "display name"]` or `false`).
    pub fn as_many2one(&self) -> Option<(RecordId, &str)> {
        let items = self.as_array()?;
        match items {
            [Value::Int(id), Value::String(name)] => Some((*id, name.as_str())),
            _ => None,
        }
    }

    /// Collect an array of integers, e.g. the result of `search`.
    pub fn as_ids(&self) -> Option<Vec<RecordId>> {
        self.as_array()?.iter().map(Value::as_i64).collect()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "'{}'", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(crate::convert::SERVER_DATETIME_FORMAT)),
            Value::Base64(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Struct(members) => {
                write!(f, "{{")?;
                for (i, (key, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format(crate::convert::SERVER_DATETIME_FORMAT).to_string())
            }
            Value::Base64(bytes) => {
                use base64::Engine as _;
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Struct(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (key, value) in members {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

/// Date fields travel as text in the server date format.
impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Value::String(date.format(crate::convert::SERVER_DATE_FORMAT).to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(members: BTreeMap<String, Value>) -> Self {
        Value::Struct(members)
    }
}

/// JSON input (CLI arguments) maps onto the wire types: `null` to nil,
/// integral numbers to int, other numbers to double, objects to structs.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(members) => {
                Value::Struct(members.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// One record id or several, always sent as a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ids {
    One(RecordId),
    Many(Vec<RecordId>),
}

impl Ids {
    /// The list form expected by `unlink` and other record methods.
    pub fn to_vec(&self) -> Vec<RecordId> {
        match self {
            Ids::One(id) => vec![*id],
            Ids::Many(ids) => ids.clone(),
        }
    }
}

impl fmt::Display for Ids {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_vec())
    }
}

impl From<RecordId> for Ids {
    fn from(id: RecordId) -> Self {
        Ids::One(id)
    }
}

impl From<Vec<RecordId>> for Ids {
    fn from(ids: Vec<RecordId>) -> Self {
        Ids::Many(ids)
    }
}

impl From<&[RecordId]> for Ids {
    fn from(ids: &[RecordId]) -> Self {
        Ids::Many(ids.to_vec())
    }
}

impl<const N: usize> From<[RecordId; N]> for Ids {
    fn from(ids: [RecordId; N]) -> Self {
        Ids::Many(ids.to_vec())
    }
}

impl From<&Ids> for Value {
    fn from(ids: &Ids) -> Self {
        Value::from(ids.to_vec())
    }
}

/// A single term of a search domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Prefix boolean operator: `|`, `&` or `!`.
    Operator(String),
    /// `(field, operator, value)`
    Condition { field: String, operator: String, value: Value },
}

impl From<&Term> for Value {
    fn from(term: &Term) -> Self {
        match term {
            Term::Operator(op) => Value::String(op.clone()),
            Term::Condition { field, operator, value } => Value::Array(vec![
                Value::String(field.clone()),
                Value::String(operator.clone()),
                value.clone(),
            ]),
        }
    }
}

/// Search criteria in prefix (Polish) notation.
///
/// The terms are forwarded untouched; only [`Domain::including_archived`]
/// adds anything of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    terms: Vec<Term>,
}

impl Domain {
    /// An empty domain (matches every active record).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `(field, operator, value)` condition.
    pub fn filter(mut self, field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push(Term::Condition {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        });
        self
    }

    /// Append a `|` prefix operator: the next two terms are OR-ed.
    pub fn or(mut self) -> Self {
        self.terms.push(Term::Operator("|".to_string()));
        self
    }

    /// Append a `&` prefix operator.
    pub fn and(mut self) -> Self {
        self.terms.push(Term::Operator("&".to_string()));
        self
    }

    /// Append a `!` prefix operator.
    pub fn not(mut self) -> Self {
        self.terms.push(Term::Operator("!".to_string()));
        self
    }

    /// Append the tautological active/inactive pair so archived records match too.
    pub fn including_archived(self) -> Self {
        self.or().filter("active", "=", true).filter("active", "!=", true)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Build a domain from its wire form (a list of strings and triples).
    pub fn from_value(value: &Value) -> Option<Self> {
        let mut terms = Vec::new();
        for item in value.as_array()? {
            match item {
                Value::String(op) => terms.push(Term::Operator(op.clone())),
                Value::Array(parts) => match parts.as_slice() {
                    [Value::String(field), Value::String(operator), value] => terms.push(Term::Condition {
                        field: field.clone(),
                        operator: operator.clone(),
                        value: value.clone(),
                    }),
                    _ => return None,
                },
                _ => return None,
            }
        }
        Some(Self { terms })
    }
}

impl From<&Domain> for Value {
    fn from(domain: &Domain) -> Self {
        Value::Array(domain.terms.iter().map(Value::from).collect())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self))
    }
}
