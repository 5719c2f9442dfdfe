//! Trashed / unpublished visibility rules
//!
//! Each dimension is governed by a [`Gate`]. Note the inversion: including
//! trashed entities means showing *only* trashed entities, and including
//! unpublished entities means showing *only* unpublished ones. Neither flag
//! widens the default listing.
//!
//! The rules are pushed into queries when the metadata declares the
//! capability, and re-checked in memory by [`VisibilityFilter`].

use std::fmt;

use super::builder::Condition;
use super::traits::{Entity, EntityMetadata};

/// Rule for one visibility dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gate {
    /// Hide flagged entities
    #[default]
    Exclude,
    /// Keep only flagged entities
    Only,
    /// Don't constrain this dimension
    Ignore,
}

impl Gate {
    pub fn from_include(include: bool) -> Self {
        if include { Gate::Only } else { Gate::Exclude }
    }

    /// Whether an entity with the given flag state passes.
    pub fn admits(self, flagged: bool) -> bool {
        match self {
            Gate::Exclude => !flagged,
            Gate::Only => flagged,
            Gate::Ignore => true,
        }
    }
}

/// Per-query visibility. The default shows only active, published content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityPolicy {
    /// Applied to entities with a non-null trashed timestamp
    pub trashed: Gate,
    /// Applied to entities with a null published timestamp
    pub unpublished: Gate,
}

impl VisibilityPolicy {
    /// `include_trashed` / `include_unpublished` in inversion mode
    pub fn from_flags(include_trashed: bool, include_unpublished: bool) -> Self {
        Self {
            trashed: Gate::from_include(include_trashed),
            unpublished: Gate::from_include(include_unpublished),
        }
    }

    /// Trashed entities only, published or not
    pub fn only_trashed() -> Self {
        Self {
            trashed: Gate::Only,
            unpublished: Gate::Ignore,
        }
    }

    /// Unpublished entities only, trashed or not
    pub fn only_unpublished() -> Self {
        Self {
            trashed: Gate::Ignore,
            unpublished: Gate::Only,
        }
    }

    pub fn unconstrained() -> Self {
        Self {
            trashed: Gate::Ignore,
            unpublished: Gate::Ignore,
        }
    }

    pub fn include_trashed(&self) -> bool {
        self.trashed == Gate::Only
    }

    pub fn include_unpublished(&self) -> bool {
        self.unpublished == Gate::Only
    }

    /// Query conditions for the capabilities `meta` declares.
    pub fn conditions(&self, meta: &EntityMetadata) -> Vec<Condition> {
        let mut conditions = Vec::new();

        if let Some(column) = meta.trashed_column {
            match self.trashed {
                Gate::Exclude => conditions.push(Condition::IsNull(column.to_string())),
                Gate::Only => conditions.push(Condition::IsNotNull(column.to_string())),
                Gate::Ignore => {}
            }
        }

        // the flag here is "unpublished", i.e. a null column
        if let Some(column) = meta.published_column {
            match self.unpublished {
                Gate::Exclude => conditions.push(Condition::IsNotNull(column.to_string())),
                Gate::Only => conditions.push(Condition::IsNull(column.to_string())),
                Gate::Ignore => {}
            }
        }

        conditions
    }
}

type FilterFn<E> = Box<dyn Fn(&E, &VisibilityPolicy) -> bool + Send + Sync>;

/// Named chain of in-memory visibility filters.
///
/// An entity is kept when every filter in the chain allows it.
pub struct VisibilityFilter<E> {
    filters: Vec<(String, FilterFn<E>)>,
}

impl<E: Entity> VisibilityFilter<E> {
    /// An empty chain that lets everything through
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// The `trashable` and `publishable` filters
    pub fn with_defaults() -> Self {
        Self::new()
            .add_filter("trashable", |entity: &E, policy| {
                entity
                    .as_trashable()
                    .is_none_or(|t| policy.trashed.admits(t.is_trashed()))
            })
            .add_filter("publishable", |entity: &E, policy| {
                entity
                    .as_publishable()
                    .is_none_or(|p| policy.unpublished.admits(!p.is_published()))
            })
    }

    /// Add a filter, replacing any existing filter of the same name.
    pub fn add_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&E, &VisibilityPolicy) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        self.filters.retain(|(existing, _)| *existing != name);
        self.filters.push((name, Box::new(filter)));
        self
    }

    /// Remove a filter by name. Returns whether it was present.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(existing, _)| existing != name);
        self.filters.len() != before
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn allows(&self, entity: &E, policy: &VisibilityPolicy) -> bool {
        self.filters.iter().all(|(_, filter)| filter(entity, policy))
    }

    pub fn apply(&self, entities: Vec<E>, policy: &VisibilityPolicy) -> Vec<E> {
        entities
            .into_iter()
            .filter(|entity| self.allows(entity, policy))
            .collect()
    }
}

impl<E: Entity> Default for VisibilityFilter<E> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<E> fmt::Debug for VisibilityFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.filters.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("VisibilityFilter")
            .field("filters", &names)
            .finish()
    }
}
