//! Result projection
//!
//! Results come back either as native entities, untouched, or as a JSON
//! string restricted to the fields of the requested groups. The `default`
//! group is always part of the request.
//!
//! Relation fields are written as the referenced id unless one of the
//! relation's expansion groups was requested, in which case the loaded
//! entity is nested (itself projected with the same groups).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::orm::{Entity, EntityMetadata, FieldMeta};
use crate::registry::MetadataRegistry;

/// Group every projection includes.
pub const DEFAULT_GROUP: &str = "default";

/// How a result should be rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSpec {
    pub as_json: bool,
    pub groups: Vec<String>,
}

impl ProjectionSpec {
    /// Return entities as they are
    pub fn native() -> Self {
        Self::default()
    }

    pub fn json<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            as_json: true,
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Requested groups plus `default`
    pub fn effective_groups(&self) -> Vec<&str> {
        let mut groups = vec![DEFAULT_GROUP];
        groups.extend(
            self.groups
                .iter()
                .map(String::as_str)
                .filter(|g| *g != DEFAULT_GROUP),
        );
        groups
    }
}

/// A projected result.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected<T> {
    Native(T),
    Json(String),
}

impl<T> Projected<T> {
    pub fn into_native(self) -> Option<T> {
        match self {
            Projected::Native(value) => Some(value),
            Projected::Json(_) => None,
        }
    }

    pub fn json(&self) -> Option<&str> {
        match self {
            Projected::Native(_) => None,
            Projected::Json(json) => Some(json),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Projected::Json(_))
    }
}

/// Renders entities according to a `ProjectionSpec`.
#[derive(Debug, Clone)]
pub struct Projector {
    registry: Arc<MetadataRegistry>,
}

impl Projector {
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self { registry }
    }

    /// Project the result of a "one" operation.
    pub fn project_one<E: Entity>(&self, entity: E, spec: &ProjectionSpec) -> Projected<E> {
        if !spec.as_json {
            return Projected::Native(entity);
        }

        let groups = spec.effective_groups();
        let value = self.project_entity(&entity, &groups);
        Projected::Json(value.to_string())
    }

    /// Project the result of a "many" operation. Always a JSON array, even
    /// with zero or one element.
    pub fn project_many<E: Entity>(
        &self,
        entities: Vec<E>,
        spec: &ProjectionSpec,
    ) -> Projected<Vec<E>> {
        if !spec.as_json {
            return Projected::Native(entities);
        }

        let groups = spec.effective_groups();
        let items: Vec<Value> = entities
            .iter()
            .map(|entity| self.project_entity(entity, &groups))
            .collect();
        Projected::Json(Value::Array(items).to_string())
    }

    /// Serialize one entity, gated by its own metadata.
    fn project_entity<E: Entity>(&self, entity: &E, groups: &[&str]) -> Value {
        let meta = E::metadata();
        self.serialize(meta.kind, entity)
            .map_or(Value::Null, |value| self.restrict(Some(meta), value, groups))
    }

    /// Serialize one item of `kind` and restrict it to `groups`. Kinds missing
    /// from the registry are serialized as they are.
    ///
    /// An item that fails to serialize becomes `null`; the listing goes on.
    pub fn project_value<T: Serialize>(&self, kind: &str, item: &T, groups: &[&str]) -> Value {
        self.serialize(kind, item)
            .map_or(Value::Null, |value| self.restrict(self.registry.get(kind), value, groups))
    }

    fn serialize<T: Serialize>(&self, kind: &str, item: &T) -> Option<Value> {
        match serde_json::to_value(item) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(kind = kind, error = %err, "Serialization degraded, emitting null");
                None
            }
        }
    }

    fn restrict(&self, meta: Option<&EntityMetadata>, value: Value, groups: &[&str]) -> Value {
        let Some(meta) = meta else {
            return value;
        };
        if !meta.has_groups() {
            return value;
        }
        let Value::Object(mut object) = value else {
            return value;
        };

        let mut out = Map::new();
        for field in meta.fields {
            if !field.in_any_group(groups.iter().copied()) {
                continue;
            }
            if let Some(field_value) = object.remove(field.name) {
                out.insert(
                    field.name.to_string(),
                    self.render_field(field, field_value, groups),
                );
            }
        }
        Value::Object(out)
    }

    fn render_field(&self, field: &FieldMeta, value: Value, groups: &[&str]) -> Value {
        let Some(relation) = field.relation else {
            return value;
        };

        let target = relation.target_metadata(&self.registry);
        let expanded = relation.expand.iter().any(|g| groups.contains(g));
        match value {
            Value::Object(_) if expanded => self.restrict(target, value, groups),
            Value::Object(nested) => {
                let id_field = target
                    .and_then(|m| m.fields.iter().find(|f| f.primary_key))
                    .map(|f| f.name)
                    .unwrap_or("id");
                nested.get(id_field).cloned().unwrap_or(Value::Null)
            }
            other => other,
        }
    }
}
