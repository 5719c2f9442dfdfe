//! Field criteria and ordering
//!
//! `Criteria` is an ordered map of field name to one value or a set of
//! acceptable values. Values in a set are OR-ed, distinct fields are AND-ed.

use once_cell::sync::Lazy;
use regex::Regex;

use super::traits::{OrderDirection, SqlValue};
use crate::error::{ModelError, Result};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Reject names that could not be a column. Existence is the backend's call.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ModelError::validation(format!(
            "invalid field name: {:?}",
            name
        )))
    }
}

/// Accepted value(s) for a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// `field = value`
    One(SqlValue),
    /// `(field = v1 OR field = v2 ...)`; an empty set matches nothing
    AnyOf(Vec<SqlValue>),
}

impl Criterion {
    /// The accepted values as a flat list
    pub fn values(&self) -> &[SqlValue] {
        match self {
            Criterion::One(value) => std::slice::from_ref(value),
            Criterion::AnyOf(values) => values,
        }
    }
}

/// Ordered field -> criterion mapping.
///
/// Setting the same field twice replaces the earlier criterion in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    entries: Vec<(String, Criterion)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field = value`
    pub fn eq(self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(field.into(), Criterion::One(value.into()))
    }

    /// Require `field` to be one of `values`
    pub fn any_of<V, I>(self, field: impl Into<String>, values: I) -> Self
    where
        V: Into<SqlValue>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.set(field.into(), Criterion::AnyOf(values))
    }

    fn set(mut self, field: String, criterion: Criterion) -> Self {
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = criterion,
            None => self.entries.push((field, criterion)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.entries.iter().map(|(field, c)| (field.as_str(), c))
    }

    pub fn get(&self, field: &str) -> Option<&Criterion> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, c)| c)
    }
}

/// Ordered sequence of sort keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSpec {
    keys: Vec<(String, OrderDirection)>,
}

impl OrderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, OrderDirection::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, OrderDirection::Desc)
    }

    pub fn then(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, OrderDirection)> {
        self.keys.iter().map(|(field, dir)| (field.as_str(), *dir))
    }
}
