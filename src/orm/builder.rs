//! Backend-agnostic query construction
//!
//! `CriteriaBuilder` turns criteria, ordering, limit/offset and a visibility
//! policy into a `QueryDescription`. Each store executes the description in
//! its own way; `to_sql` renders it as a parameterized SQLite statement.

use super::criteria::{Criteria, Criterion, OrderSpec, validate_identifier};
use super::traits::{EntityMetadata, OrderDirection, SqlValue};
use super::visibility::VisibilityPolicy;
use crate::error::{ModelError, Result};

/// A single WHERE condition. Conditions in a query are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `(column = v1 OR column = v2 ...)`; empty matches nothing
    AnyOf {
        column: String,
        values: Vec<SqlValue>,
    },
    IsNull(String),
    IsNotNull(String),
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::AnyOf { column, .. } => column,
            Condition::IsNull(column) | Condition::IsNotNull(column) => column,
        }
    }
}

/// The query a store is asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescription {
    /// Entity kind being queried
    pub kind: &'static str,
    pub conditions: Vec<Condition>,
    /// Sort keys as (column, direction); empty means backend order
    pub order: Vec<(String, OrderDirection)>,
    /// `None` means unbounded
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueryDescription {
    /// Build the SELECT statement and its bind values.
    pub fn to_sql(&self, meta: &EntityMetadata) -> (String, Vec<SqlValue>) {
        let alias = meta.alias();
        let columns: Vec<String> = meta
            .column_names()
            .iter()
            .map(|c| format!("{}.{}", alias, c))
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {} {}",
            columns.join(", "),
            meta.table,
            alias
        );
        let values = self.push_where(&mut sql, &alias);

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, dir)| format!("{}.{} {}", alias, column, dir.to_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
            }
            (None, _) => {}
        }

        (sql, values)
    }

    /// Build a COUNT statement over the same conditions, ignoring order and bounds.
    pub fn to_count_sql(&self, meta: &EntityMetadata) -> (String, Vec<SqlValue>) {
        let alias = meta.alias();
        let mut sql = format!("SELECT COUNT(*) FROM {} {}", meta.table, alias);
        let values = self.push_where(&mut sql, &alias);
        (sql, values)
    }

    fn push_where(&self, sql: &mut String, alias: &str) -> Vec<SqlValue> {
        let mut values = Vec::new();
        if self.conditions.is_empty() {
            return values;
        }

        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|condition| render_condition(condition, alias, &mut values))
            .collect();

        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        values
    }
}

fn render_condition(condition: &Condition, alias: &str, values: &mut Vec<SqlValue>) -> String {
    match condition {
        Condition::IsNull(column) => format!("{}.{} IS NULL", alias, column),
        Condition::IsNotNull(column) => format!("{}.{} IS NOT NULL", alias, column),
        Condition::AnyOf { values: set, .. } if set.is_empty() => "0 = 1".to_string(),
        Condition::AnyOf { column, values: set } => {
            let parts: Vec<String> = set
                .iter()
                .map(|value| {
                    if value.is_null() {
                        format!("{}.{} IS NULL", alias, column)
                    } else {
                        values.push(value.clone());
                        format!("{}.{} = ?{}", alias, column, values.len())
                    }
                })
                .collect();

            if parts.len() == 1 {
                parts.join("")
            } else {
                format!("({})", parts.join(" OR "))
            }
        }
    }
}

/// Builds `QueryDescription`s for one entity type.
pub struct CriteriaBuilder {
    meta: &'static EntityMetadata,
    visibility: VisibilityPolicy,
}

impl CriteriaBuilder {
    /// A builder with no visibility constraints
    pub fn new(meta: &'static EntityMetadata) -> Self {
        Self {
            meta,
            visibility: VisibilityPolicy::unconstrained(),
        }
    }

    /// Push a visibility policy into every built query.
    pub fn with_visibility(mut self, policy: VisibilityPolicy) -> Self {
        self.visibility = policy;
        self
    }

    /// Translate criteria, order and bounds into a query description.
    ///
    /// Field names are mapped to columns through the entity metadata; names the
    /// metadata does not know are passed through for the backend to reject.
    pub fn build(
        &self,
        criteria: &Criteria,
        order: Option<&OrderSpec>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<QueryDescription> {
        let mut conditions = Vec::with_capacity(criteria.len() + 2);

        for (field, criterion) in criteria.iter() {
            validate_identifier(field)?;
            let values = match criterion {
                Criterion::One(value) => vec![value.clone()],
                Criterion::AnyOf(values) => values.clone(),
            };
            conditions.push(Condition::AnyOf {
                column: self.column_for(field),
                values,
            });
        }

        conditions.extend(self.visibility.conditions(self.meta));

        let mut order_keys = Vec::new();
        if let Some(order) = order {
            for (field, dir) in order.iter() {
                validate_identifier(field)?;
                order_keys.push((self.column_for(field), dir));
            }
        }

        if let Some(limit) = limit.filter(|l| *l < 1) {
            return Err(ModelError::validation(format!(
                "limit must be at least 1, got {}",
                limit
            )));
        }
        if let Some(offset) = offset.filter(|o| *o < 0) {
            return Err(ModelError::validation(format!(
                "offset must not be negative, got {}",
                offset
            )));
        }

        Ok(QueryDescription {
            kind: self.meta.kind,
            conditions,
            order: order_keys,
            limit,
            offset,
        })
    }

    fn column_for(&self, field: &str) -> String {
        self.meta
            .field(field)
            .map(|f| f.column)
            .unwrap_or(field)
            .to_string()
    }
}
