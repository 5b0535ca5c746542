//! Typed access to the loosely-typed argument map of a field.

use crate::{cursor::Cursor, GraphqlError, GraphqlResult};
use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Arguments supplied to one field occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(IndexMap<Name, ConstValue>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument, replacing any previous value under the same name.
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<ConstValue>) -> Self {
        self.0.insert(Name::new(name), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Integer value of an argument. Absent and `null` arguments yield `None`.
    pub fn int_value(&self, name: &str) -> GraphqlResult<Option<i64>> {
        match self.get(name) {
            None | Some(ConstValue::Null) => Ok(None),
            Some(ConstValue::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                GraphqlError::ArgumentCoercionError(format!(
                    "Argument {name:?} is not an integer: {n}"
                ))
            }),
            Some(other) => Err(GraphqlError::ArgumentCoercionError(format!(
                "Argument {name:?} is not an integer: {other}"
            ))),
        }
    }

    /// String value of an argument. Enum values are accepted by name.
    pub fn string_value(&self, name: &str) -> GraphqlResult<Option<String>> {
        match self.get(name) {
            None | Some(ConstValue::Null) => Ok(None),
            Some(ConstValue::String(s)) => Ok(Some(s.clone())),
            Some(ConstValue::Enum(e)) => Ok(Some(e.to_string())),
            Some(other) => Err(GraphqlError::ArgumentCoercionError(format!(
                "Argument {name:?} is not a string: {other}"
            ))),
        }
    }

    pub fn bool_value(&self, name: &str) -> GraphqlResult<Option<bool>> {
        match self.get(name) {
            None | Some(ConstValue::Null) => Ok(None),
            Some(ConstValue::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(GraphqlError::ArgumentCoercionError(format!(
                "Argument {name:?} is not a boolean: {other}"
            ))),
        }
    }
}

impl FromIterator<(Name, ConstValue)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (Name, ConstValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The Relay pagination arguments of a field, as supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArguments {
    pub first: Option<i64>,
    pub after: Option<Cursor>,
    pub last: Option<i64>,
    pub before: Option<Cursor>,
}

/// Validated pagination arguments with cursors decoded into offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingBounds {
    pub first: Option<usize>,
    pub after: Option<usize>,
    pub last: Option<usize>,
    pub before: Option<usize>,
}

impl ConnectionArguments {
    pub fn from_arguments(args: &Arguments) -> GraphqlResult<Self> {
        Ok(Self {
            first: args.int_value("first")?,
            after: args.string_value("after")?.map(Cursor::from),
            last: args.int_value("last")?,
            before: args.string_value("before")?.map(Cursor::from),
        })
    }

    pub fn forward(first: i64) -> Self {
        Self {
            first: Some(first),
            ..Self::default()
        }
    }

    pub fn backward(last: i64) -> Self {
        Self {
            last: Some(last),
            ..Self::default()
        }
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    pub fn before(mut self, cursor: Cursor) -> Self {
        self.before = Some(cursor);
        self
    }

    pub fn bounds(&self) -> GraphqlResult<PagingBounds> {
        Ok(PagingBounds {
            first: page_size("first", self.first)?,
            after: self.after.as_ref().map(Cursor::decode).transpose()?,
            last: page_size("last", self.last)?,
            before: self.before.as_ref().map(Cursor::decode).transpose()?,
        })
    }
}

fn page_size(name: &str, value: Option<i64>) -> GraphqlResult<Option<usize>> {
    value
        .map(|n| {
            usize::try_from(n).map_err(|_| {
                GraphqlError::InvalidPaginationArgument(format!(
                    "{name:?} must be non-negative, got {n}"
                ))
            })
        })
        .transpose()
}

/// Render a column value as a SQL literal.
pub fn sql_literal(value: &JsonValue) -> GraphqlResult<String> {
    match value {
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        JsonValue::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        other => Err(GraphqlError::ArgumentCoercionError(format!(
            "Cannot use {other} as a SQL literal"
        ))),
    }
}
