//! In-memory store
//!
//! Evaluates query descriptions against the serialized form of each entity.
//! Columns are mapped back to fields through the entity metadata, so a query
//! that would fail on SQLite (unknown column) fails here too.

use std::cmp::Ordering;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use super::Store;
use crate::error::{ModelError, Result};
use crate::orm::{Condition, Entity, EntityMetadata, OrderDirection, QueryDescription, SqlValue};

pub struct MemoryStore<E> {
    entities: RwLock<Vec<E>>,
    _phantom: PhantomData<fn() -> E>,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self::with_entities(Vec::new())
    }

    pub fn with_entities(entities: Vec<E>) -> Self {
        Self {
            entities: RwLock::new(entities),
            _phantom: PhantomData,
        }
    }

    pub fn insert(&self, entity: E) {
        self.entities.write().push(entity);
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Entities matching the query's conditions, sorted, with their JSON form.
    fn matching(&self, query: &QueryDescription) -> Result<Vec<(E, Value)>> {
        let meta = E::metadata();
        let entities = self.entities.read();

        let mut matched = Vec::new();
        for entity in entities.iter() {
            let value = serde_json::to_value(entity)
                .map_err(|e| ModelError::Query(format!("failed to evaluate {}: {}", meta.kind, e)))?;

            let mut keep = true;
            for condition in &query.conditions {
                if !evaluate(meta, condition, &value)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push((entity.clone(), value));
            }
        }

        if !query.order.is_empty() {
            let mut keys = Vec::with_capacity(query.order.len());
            for (column, dir) in &query.order {
                keys.push((field_name(meta, column)?, *dir));
            }

            matched.sort_by(|(_, a), (_, b)| {
                for (field, dir) in &keys {
                    let ordering = compare(&column_value(a, field), &column_value(b, field));
                    let ordering = match dir {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        Ok(matched)
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Store<E> for MemoryStore<E> {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<E>> {
        tracing::debug!(kind = query.kind, conditions = query.conditions.len(), "Evaluating in-memory query");

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(self
            .matching(query)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(entity, _)| entity)
            .collect())
    }

    async fn count(&self, query: &QueryDescription) -> Result<i64> {
        Ok(self.matching(query)?.len() as i64)
    }
}

fn field_name(meta: &EntityMetadata, column: &str) -> Result<&'static str> {
    meta.field_by_column(column)
        .map(|f| f.name)
        .ok_or_else(|| ModelError::Query(format!("no such column: {}", column)))
}

/// A field's value with relations reduced to the referenced id.
fn column_value(entity: &Value, field: &str) -> Value {
    match entity.get(field) {
        Some(Value::Object(nested)) => nested.get("id").cloned().unwrap_or(Value::Null),
        Some(value) => value.clone(),
        None => Value::Null,
    }
}

fn evaluate(meta: &EntityMetadata, condition: &Condition, entity: &Value) -> Result<bool> {
    let field = field_name(meta, condition.column())?;
    let value = column_value(entity, field);

    Ok(match condition {
        Condition::IsNull(_) => value.is_null(),
        Condition::IsNotNull(_) => !value.is_null(),
        Condition::AnyOf { values, .. } => values.iter().any(|wanted| matches(&value, wanted)),
    })
}

fn matches(value: &Value, wanted: &SqlValue) -> bool {
    match (value, wanted) {
        (Value::Null, SqlValue::Null) => true,
        (Value::Null, _) | (_, SqlValue::Null) => false,
        (Value::Number(n), SqlValue::Int(i)) => n.as_i64() == Some(*i) || n.as_f64() == Some(*i as f64),
        (Value::Number(n), SqlValue::Float(f)) => n.as_f64() == Some(*f),
        (Value::Number(n), SqlValue::Bool(b)) => n.as_i64() == Some(i64::from(*b)),
        (Value::Number(n), SqlValue::String(s)) => s.parse::<f64>().ok() == n.as_f64(),
        (Value::Bool(a), SqlValue::Bool(b)) => a == b,
        (Value::Bool(a), SqlValue::Int(i)) => i64::from(*a) == *i,
        (Value::String(a), SqlValue::String(b)) => a == b || same_instant(a, b),
        (Value::String(a), SqlValue::Int(i)) => a.parse::<i64>().ok() == Some(*i),
        _ => false,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn same_instant(a: &str, b: &str) -> bool {
    match (parse_instant(a), parse_instant(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Total order over JSON scalars; nulls sort first like SQLite.
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }

    fn number(v: &Value) -> f64 {
        match v {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => match (parse_instant(x), parse_instant(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        _ if rank(a) == 1 && rank(b) == 1 => number(a).total_cmp(&number(b)),
        _ => rank(a).cmp(&rank(b)),
    }
}
