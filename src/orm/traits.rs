//! Core traits and metadata for the retrieval layer
//!
//! `DatabaseEntity` and `FromSqlRow` are implemented by the
//! `#[derive(DatabaseEntity)]` macro from `murmur-macros`. `Entity` and the
//! capability traits (`Trashable`, `Publishable`) are implemented by hand on
//! each entity type.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use sqlx::sqlite::SqliteRow;

/// Column/field definition for an entity.
#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    /// Rust field name, also the key used when the entity is serialized
    pub name: &'static str,
    /// Column name in the database
    pub column: &'static str,
    /// SQLite column type (TEXT, INTEGER, REAL)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Whether the column holds a unique lookup key (slug, uuid)
    pub unique: bool,
    /// Projection groups this field belongs to
    pub groups: &'static [&'static str],
    /// Set when the field references another entity
    pub relation: Option<RelationMeta>,
}

impl FieldMeta {
    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.column, self.sql_type);

        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }

        if !self.nullable && !self.primary_key {
            sql.push_str(" NOT NULL");
        }

        if self.unique && !self.primary_key {
            sql.push_str(" UNIQUE");
        }

        sql
    }

    /// Whether any of `groups` selects this field.
    pub fn in_any_group<'a>(&self, mut groups: impl Iterator<Item = &'a str>) -> bool {
        groups.any(|g| self.groups.contains(&g))
    }
}

/// A reference from one entity to another (e.g. a post's author).
#[derive(Debug, Clone, Copy)]
pub struct RelationMeta {
    /// Kind of the referenced entity
    pub target: &'static str,
    /// Groups that expand the reference into the nested entity
    pub expand: &'static [&'static str],
    /// Metadata of the referenced type, set for `Reference<T>` fields
    pub metadata: Option<fn() -> &'static EntityMetadata>,
}

impl RelationMeta {
    /// The target's metadata, falling back to `registry` for relations
    /// declared by name only.
    pub fn target_metadata(
        &self,
        registry: &crate::registry::MetadataRegistry,
    ) -> Option<&'static EntityMetadata> {
        self.metadata
            .map(|metadata| metadata())
            .or_else(|| registry.get(self.target))
    }
}

/// Statically declared description of an entity type.
///
/// One record exists per entity type; it replaces runtime checks of the
/// form "does this type have property X".
#[derive(Debug)]
pub struct EntityMetadata {
    /// Registry key (e.g. "MicroPost")
    pub kind: &'static str,
    /// The SQL table name (e.g. "micro_posts")
    pub table: &'static str,
    /// The primary key column name
    pub primary_key: &'static str,
    /// Soft-delete column, when the entity is trashable
    pub trashed_column: Option<&'static str>,
    /// Publish timestamp column, when the entity is publishable
    pub published_column: Option<&'static str>,
    /// All fields in declaration order
    pub fields: &'static [FieldMeta],
}

impl EntityMetadata {
    pub fn is_trashable(&self) -> bool {
        self.trashed_column.is_some()
    }

    pub fn is_publishable(&self) -> bool {
        self.published_column.is_some()
    }

    /// Look up a field by its Rust/serialized name
    pub fn field(&self, name: &str) -> Option<&'static FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by its column name
    pub fn field_by_column(&self, column: &str) -> Option<&'static FieldMeta> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Whether `column` is declared as a unique lookup key
    pub fn is_unique_column(&self, column: &str) -> bool {
        self.field_by_column(column)
            .is_some_and(|f| f.unique || f.primary_key)
    }

    /// List of all column names in the table
    pub fn column_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.column).collect()
    }

    /// Whether any field carries projection groups at all.
    ///
    /// Entities without any group annotations are serialized generically.
    pub fn has_groups(&self) -> bool {
        self.fields.iter().any(|f| !f.groups.is_empty())
    }

    /// Query alias built from the capital letters of the kind
    /// (`MicroPost` -> `mp`, `User` -> `u`).
    pub fn alias(&self) -> String {
        let alias: String = self
            .kind
            .chars()
            .filter(|c| c.is_ascii_uppercase())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if alias.is_empty() {
            self.table.chars().take(1).collect()
        } else {
            alias
        }
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    pub fn create_table_sql(&self) -> String {
        let column_defs: Vec<String> = self.fields.iter().map(|f| f.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.table,
            column_defs.join(",\n  ")
        )
    }
}

/// Metadata and row encoding for a database entity.
///
/// Implemented by `#[derive(DatabaseEntity)]`.
pub trait DatabaseEntity: Sized + Send + Sync {
    /// The static metadata record for this entity type
    fn metadata() -> &'static EntityMetadata;

    /// Primary key value
    fn id(&self) -> i64;

    /// Column values in `metadata().fields` order
    fn to_sql_values(&self) -> Vec<SqlValue>;
}

/// Trait for decoding a database row into an entity.
///
/// Implemented by `#[derive(DatabaseEntity)]`.
pub trait FromSqlRow: Sized {
    /// Decode a SQLite row into this entity type
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Soft-deletion via a nullable "trashed at" timestamp.
pub trait Trashable {
    fn trashed_at(&self) -> Option<DateTime<Utc>>;

    fn is_trashed(&self) -> bool {
        self.trashed_at().is_some()
    }
}

/// Visibility gating via a nullable "published at" timestamp.
pub trait Publishable {
    fn published_at(&self) -> Option<DateTime<Utc>>;

    fn is_published(&self) -> bool {
        self.published_at().is_some()
    }
}

/// Lookup by a human-readable slug.
pub trait Sluggable {
    fn slug(&self) -> Option<&str>;
}

/// Lookup by a public UUID.
pub trait Uniqable {
    fn uuid(&self) -> Option<&str>;
}

/// A retrievable domain record.
///
/// Capabilities are reached through the `as_*` accessors so the visibility
/// filter can ask "is this trashable" without knowing the concrete type.
pub trait Entity:
    DatabaseEntity + FromSqlRow + Serialize + Clone + fmt::Debug + Unpin + 'static
{
    fn as_trashable(&self) -> Option<&dyn Trashable> {
        None
    }

    fn as_publishable(&self) -> Option<&dyn Publishable> {
        None
    }

    fn as_sluggable(&self) -> Option<&dyn Sluggable> {
        None
    }

    fn as_uniqable(&self) -> Option<&dyn Uniqable> {
        None
    }
}

/// Sort direction for ORDER BY clauses.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    Desc,
}

impl OrderDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Represents a SQL value that can be bound to a query.
///
/// Used by criteria to collect values for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder at the next parameter index
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::String(s) => write!(f, "{s}"),
            SqlValue::Int(i) => write!(f, "{i}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Bool(b) => write!(f, "{b}"),
            SqlValue::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        value.to_sql_value()
    }
}

/// Conversion of an entity field into a bindable value.
pub trait ToSqlValue {
    fn to_sql_value(&self) -> SqlValue;
}

macro_rules! int_to_sql_value {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }
            }
        )*
    };
}

int_to_sql_value!(i64, i32, i16, i8, u32, u16, u8);

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(self.clone())
    }
}

impl ToSqlValue for DateTime<Utc> {
    /// Fixed-width RFC 3339 so that TEXT ordering matches time ordering
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(self.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        match self {
            Some(value) => value.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// A field pointing at another entity.
///
/// Rows decode to `Id`; callers that join or preload the target can swap in
/// `Loaded`. Serializes as the bare id or as the nested entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<E> {
    Id(i64),
    Loaded(Box<E>),
}

impl<E: DatabaseEntity> Reference<E> {
    pub fn load(entity: E) -> Self {
        Reference::Loaded(Box::new(entity))
    }

    pub fn id(&self) -> i64 {
        match self {
            Reference::Id(id) => *id,
            Reference::Loaded(entity) => entity.id(),
        }
    }

    pub fn loaded(&self) -> Option<&E> {
        match self {
            Reference::Id(_) => None,
            Reference::Loaded(entity) => Some(entity),
        }
    }
}

impl<E: Serialize> Serialize for Reference<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reference::Id(id) => serializer.serialize_i64(*id),
            Reference::Loaded(entity) => entity.serialize(serializer),
        }
    }
}

impl<E: DatabaseEntity> ToSqlValue for Reference<E> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(self.id())
    }
}
