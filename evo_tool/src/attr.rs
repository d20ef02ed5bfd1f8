//! Attribute schemas.
//!
//! Every node kind declares its persisted attributes as a static list of
//! [`AttrDescriptor`]s: key, type, getter and setter. Serialization walks
//! the list, so every declared attribute is written and nothing else is.

use core::fmt;

use serde_json::Value;

use crate::error::{AttrError, TableError};
use crate::tabular::{TabularArray, parse_table_text, table_text};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Text,
    Bool,
    Int,
    Float,
    /// Tabular array stored as JSON text.
    Table,
}

impl AttrType {
    /// Description used in type-mismatch errors.
    pub const fn expected(self) -> &'static str {
        match self {
            Self::Text => "a string",
            Self::Bool => "a bool",
            Self::Int => "an integer",
            Self::Float => "a number",
            Self::Table => "a tabular array string",
        }
    }
}

/// Value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl AttrValue {
    /// JSON form written to the tree file.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::from(s.as_str()),
            Self::Bool(b) => Value::from(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
        }
    }

    /// Read a JSON value as an attribute of type `ty`.
    pub fn from_json(key: &'static str, ty: AttrType, value: &Value) -> Result<Self, AttrError> {
        let mismatch = || AttrError::TypeMismatch {
            key,
            expected: ty.expected(),
        };
        match ty {
            AttrType::Text | AttrType::Table => value
                .as_str()
                .map(|s| Self::Text(s.to_string()))
                .ok_or_else(mismatch),
            AttrType::Bool => value.as_bool().map(Self::Bool).ok_or_else(mismatch),
            AttrType::Int => value.as_i64().map(Self::Int).ok_or_else(mismatch),
            AttrType::Float => value.as_f64().map(Self::Float).ok_or_else(mismatch),
        }
    }

    /// String content, or a type error for `key`.
    pub fn text(self, key: &'static str) -> Result<String, AttrError> {
        match self {
            Self::Text(s) => Ok(s),
            _ => Err(AttrError::TypeMismatch {
                key,
                expected: AttrType::Text.expected(),
            }),
        }
    }

    /// Integer content, or a type error for `key`.
    pub fn int(self, key: &'static str) -> Result<i64, AttrError> {
        match self {
            Self::Int(i) => Ok(i),
            _ => Err(AttrError::TypeMismatch {
                key,
                expected: AttrType::Int.expected(),
            }),
        }
    }

    /// Finite numeric content (integers widen), or an error for `key`.
    pub fn float(self, key: &'static str) -> Result<f64, AttrError> {
        let v = match self {
            Self::Float(f) => f,
            Self::Int(i) => i as f64,
            _ => {
                return Err(AttrError::TypeMismatch {
                    key,
                    expected: AttrType::Float.expected(),
                });
            }
        };
        if !v.is_finite() {
            return Err(AttrError::Invalid {
                key,
                reason: format!("{v} is not finite"),
            });
        }
        Ok(v)
    }

    /// Tabular array carried as JSON text, or an error for `key`.
    pub fn table(self, key: &'static str) -> Result<TabularArray, AttrError> {
        let text = self.text(key).map_err(|_| AttrError::TypeMismatch {
            key,
            expected: AttrType::Table.expected(),
        })?;
        parse_table_text(&text).map_err(|e| AttrError::Table {
            key,
            source: TableError::Schema(e),
        })
    }

    /// Table attribute value from a tabular array.
    pub fn from_table(table: &TabularArray) -> Self {
        Self::Text(table_text(table))
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One declared attribute of `T`.
pub struct AttrDescriptor<T: 'static> {
    /// Persisted key.
    pub key: &'static str,
    /// Declared type.
    pub ty: AttrType,
    /// Read the attribute.
    pub get: fn(&T) -> AttrValue,
    /// Write the attribute; rejects wrong types and invalid values.
    pub set: fn(&mut T, AttrValue) -> Result<(), AttrError>,
}

/// Types with a static attribute schema.
pub trait HasSchema: Sized + 'static {
    /// Declared attributes, sorted by key.
    const SCHEMA: &'static [AttrDescriptor<Self>];

    /// Descriptor of `key`.
    fn descriptor(key: &str) -> Option<&'static AttrDescriptor<Self>> {
        Self::SCHEMA.iter().find(|d| d.key == key)
    }

    /// Read `key`, `None` if undeclared.
    fn get_attr(&self, key: &str) -> Option<AttrValue> {
        Self::descriptor(key).map(|d| (d.get)(self))
    }

    /// Write `key`, `None` if undeclared.
    fn set_attr(&mut self, key: &str, value: AttrValue) -> Option<Result<(), AttrError>> {
        Self::descriptor(key).map(|d| (d.set)(self, value))
    }

    /// Declared keys with their types.
    fn declared() -> Vec<(&'static str, AttrType)> {
        Self::SCHEMA.iter().map(|d| (d.key, d.ty)).collect()
    }
}
