//! Retrieval façade
//!
//! `Model` composes criteria building, visibility filtering, pagination and
//! projection for one entity type. All per-call configuration lives in an
//! immutable [`Request`], so a single `Model` can serve concurrent callers.
//!
//! Every operation runs the same pipeline: build the query (with visibility
//! pushed down), fetch from the store, re-check visibility in memory, fail
//! with `NotFound` if a "one" operation came back empty, then project.
//!
//! ```rust,ignore
//! let posts = Model::new(db.store::<MicroPost>(), registry);
//!
//! let page = posts
//!     .find_all(&Request::new().paginate(2, 10).json().group("stats"))
//!     .await?;
//! ```

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::orm::pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::orm::{
    Criteria, CriteriaBuilder, Entity, OrderSpec, PageRequest, SqlValue, VisibilityFilter,
    VisibilityPolicy,
};
use crate::projection::{Projected, ProjectionSpec, Projector};
use crate::registry::MetadataRegistry;
use crate::store::Store;
use crate::uuid_codec;

/// Per-call configuration. Built fresh for each call; nothing carries over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    groups: Vec<String>,
    as_json: bool,
    page: Option<i64>,
    per_page: Option<i64>,
    visibility: VisibilityPolicy,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the requested projection groups
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Render results as a JSON string
    pub fn json(self) -> Self {
        self.as_json(true)
    }

    pub fn as_json(mut self, as_json: bool) -> Self {
        self.as_json = as_json;
        self
    }

    /// Paginate with the model's default page size
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn paginate(mut self, page: i64, per_page: i64) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    /// Show only trashed entities
    pub fn only_trashed(self) -> Self {
        self.with_visibility(VisibilityPolicy::only_trashed())
    }

    /// Show only unpublished entities
    pub fn only_unpublished(self) -> Self {
        self.with_visibility(VisibilityPolicy::only_unpublished())
    }

    pub fn with_visibility(mut self, policy: VisibilityPolicy) -> Self {
        self.visibility = policy;
        self
    }

    pub fn visibility(&self) -> VisibilityPolicy {
        self.visibility
    }

    pub fn is_paginated(&self) -> bool {
        self.page.is_some() || self.per_page.is_some()
    }

    fn projection(&self, default_groups: &[String]) -> ProjectionSpec {
        let mut groups = default_groups.to_vec();
        groups.extend(self.groups.iter().cloned());
        ProjectionSpec {
            as_json: self.as_json,
            groups,
        }
    }
}

/// A slug or UUID lookup value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueKey {
    Slug(String),
    Uuid(String),
}

impl UniqueKey {
    pub fn slug(value: impl Into<String>) -> Self {
        UniqueKey::Slug(value.into())
    }

    pub fn uuid(value: impl Into<String>) -> Self {
        UniqueKey::Uuid(value.into())
    }

    /// Column holding this kind of key
    pub fn column(&self) -> &'static str {
        match self {
            UniqueKey::Slug(_) => "slug",
            UniqueKey::Uuid(_) => "uuid",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            UniqueKey::Slug(value) | UniqueKey::Uuid(value) => value,
        }
    }

    /// The value in its stored form. UUIDs are accepted in any notation
    /// `Uuid::parse_str` understands and compared lowercase hyphenated.
    pub fn lookup_value(&self) -> Result<String> {
        match self {
            UniqueKey::Slug(value) => Ok(value.clone()),
            UniqueKey::Uuid(value) => Uuid::parse_str(value)
                .map(|uuid| uuid.to_string())
                .map_err(|err| ModelError::validation(format!("invalid uuid {}: {}", value, err))),
        }
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column(), self.value())
    }
}

/// Retrieval façade for entity type `E` over store `S`.
pub struct Model<E: Entity, S: Store<E>> {
    store: S,
    projector: Projector,
    filter: VisibilityFilter<E>,
    per_page: i64,
    max_per_page: i64,
    default_groups: Vec<String>,
}

impl<E: Entity, S: Store<E>> Model<E, S> {
    pub fn new(store: S, registry: Arc<MetadataRegistry>) -> Self {
        Self {
            store,
            projector: Projector::new(registry),
            filter: VisibilityFilter::with_defaults(),
            per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
            default_groups: Vec::new(),
        }
    }

    /// Take page sizes and default groups from `config`
    pub fn with_config(mut self, config: &Config) -> Self {
        self.per_page = config.per_page;
        self.max_per_page = config.max_per_page;
        self.default_groups = config.default_groups.clone();
        self
    }

    /// Replace the in-memory visibility chain
    pub fn with_filter(mut self, filter: VisibilityFilter<E>) -> Self {
        self.filter = filter;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn find_by_id(&self, id: i64, request: &Request) -> Result<Projected<E>> {
        let meta = E::metadata();
        let criteria = Criteria::new().eq(meta.primary_key, id);
        let found = self
            .resolve(&criteria, None, Some(1), None, request.visibility())
            .await?;

        self.one(found, id, request)
    }

    pub async fn find_by_unique_key(&self, key: &UniqueKey, request: &Request) -> Result<Projected<E>> {
        let meta = E::metadata();
        if !meta.is_unique_column(key.column()) {
            return Err(ModelError::validation(format!(
                "{} has no unique {} key",
                meta.kind,
                key.column()
            )));
        }

        let criteria = Criteria::new().eq(key.column(), key.lookup_value()?);
        let found = self
            .resolve(&criteria, None, Some(1), None, request.visibility())
            .await?;

        self.one(found, key, request)
    }

    /// Look up by a base-62 short UUID.
    pub async fn find_by_encoded_uuid(&self, encoded: &str, request: &Request) -> Result<Projected<E>> {
        let uuid = uuid_codec::decode(encoded)?;
        self.find_by_unique_key(&UniqueKey::Uuid(uuid.to_string()), request)
            .await
    }

    /// Filter by criteria. Explicit `limit`/`offset` take precedence over
    /// the request's pagination.
    pub async fn find_by_criteria(
        &self,
        criteria: &Criteria,
        order: Option<&OrderSpec>,
        limit: Option<i64>,
        offset: Option<i64>,
        request: &Request,
    ) -> Result<Projected<Vec<E>>> {
        let (page_limit, page_offset) = self.bounds(request)?;
        let found = self
            .resolve(
                criteria,
                order,
                limit.or(page_limit),
                offset.or(page_offset),
                request.visibility(),
            )
            .await?;

        Ok(self.projector.project_many(found, &request.projection(&self.default_groups)))
    }

    pub async fn find_many(&self, ids: &[i64], request: &Request) -> Result<Projected<Vec<E>>> {
        let criteria = Criteria::new().any_of(E::metadata().primary_key, ids.iter().copied());
        self.find_by_criteria(&criteria, None, None, None, request)
            .await
    }

    /// Every entity visible under the request's policy.
    pub async fn find_all(&self, request: &Request) -> Result<Projected<Vec<E>>> {
        self.find_by_criteria(&Criteria::new(), None, None, None, request)
            .await
    }

    /// Trashed entities, newest first. Publication state is not considered.
    pub async fn get_trashed_only(&self, request: &Request) -> Result<Projected<Vec<E>>> {
        if !E::metadata().is_trashable() {
            return Ok(self.empty(request));
        }
        let request = request.clone().only_trashed();
        self.find_newest_first(&request).await
    }

    /// Unpublished entities, newest first. Trashed state is not considered.
    pub async fn get_unpublished_only(&self, request: &Request) -> Result<Projected<Vec<E>>> {
        if !E::metadata().is_publishable() {
            return Ok(self.empty(request));
        }
        let request = request.clone().only_unpublished();
        self.find_newest_first(&request).await
    }

    /// Entities matching any of `keys`, slugs and UUIDs alike, ordered by
    /// primary key. The request's pagination applies to the combined list.
    pub async fn find_many_by_unique_keys(
        &self,
        keys: &[UniqueKey],
        request: &Request,
    ) -> Result<Projected<Vec<E>>> {
        let meta = E::metadata();
        let (limit, offset) = self.bounds(request)?;
        let mut found: Vec<E> = Vec::new();

        for column in ["slug", "uuid"] {
            let values = keys
                .iter()
                .filter(|k| k.column() == column)
                .map(|k| k.lookup_value().map(SqlValue::from))
                .collect::<Result<Vec<_>>>()?;
            if values.is_empty() {
                continue;
            }
            if !meta.is_unique_column(column) {
                return Err(ModelError::validation(format!(
                    "{} has no unique {} key",
                    meta.kind, column
                )));
            }

            let criteria = Criteria::new().any_of(column, values);
            for entity in self
                .resolve(&criteria, None, None, None, request.visibility())
                .await?
            {
                if !found.iter().any(|e| e.id() == entity.id()) {
                    found.push(entity);
                }
            }
        }

        found.sort_by_key(|e| e.id());
        let found = found
            .into_iter()
            .skip(offset.map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX)))
            .take(limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX)))
            .collect();

        Ok(self.projector.project_many(found, &request.projection(&self.default_groups)))
    }

    /// Decode every short UUID, then look them all up. One bad value fails the call.
    pub async fn find_many_by_encoded_uuids(
        &self,
        encoded: &[&str],
        request: &Request,
    ) -> Result<Projected<Vec<E>>> {
        let keys = encoded
            .iter()
            .map(|e| uuid_codec::decode(e).map(|u| UniqueKey::Uuid(u.to_string())))
            .collect::<Result<Vec<_>>>()?;

        self.find_many_by_unique_keys(&keys, request).await
    }

    /// Number of entities matching `criteria` under the request's policy.
    pub async fn count_by_criteria(&self, criteria: &Criteria, request: &Request) -> Result<i64> {
        let query = CriteriaBuilder::new(E::metadata())
            .with_visibility(request.visibility())
            .build(criteria, None, None, None)?;
        self.store.count(&query).await
    }

    async fn find_newest_first(&self, request: &Request) -> Result<Projected<Vec<E>>> {
        let order = OrderSpec::new().desc("created_at");
        self.find_by_criteria(&Criteria::new(), Some(&order), None, None, request)
            .await
    }

    async fn resolve(
        &self,
        criteria: &Criteria,
        order: Option<&OrderSpec>,
        limit: Option<i64>,
        offset: Option<i64>,
        policy: VisibilityPolicy,
    ) -> Result<Vec<E>> {
        let meta = E::metadata();
        let query = CriteriaBuilder::new(meta)
            .with_visibility(policy)
            .build(criteria, order, limit, offset)?;

        let fetched = self.store.fetch(&query).await?;
        let fetched_len = fetched.len();
        let visible = self.filter.apply(fetched, &policy);

        if visible.len() != fetched_len {
            tracing::debug!(
                kind = meta.kind,
                dropped = fetched_len - visible.len(),
                "Visibility filter dropped rows the query returned"
            );
        }

        Ok(visible)
    }

    fn bounds(&self, request: &Request) -> Result<(Option<i64>, Option<i64>)> {
        if !request.is_paginated() {
            return Ok((None, None));
        }

        let page = PageRequest::new(
            request.page.unwrap_or(1),
            request.per_page.unwrap_or(self.per_page),
        )?
        .within(self.max_per_page)?;

        Ok((Some(page.limit()), Some(page.offset())))
    }

    fn one(&self, found: Vec<E>, key: impl fmt::Display, request: &Request) -> Result<Projected<E>> {
        let entity = found
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::not_found(E::metadata().kind, key))?;

        Ok(self.projector.project_one(entity, &request.projection(&self.default_groups)))
    }

    fn empty(&self, request: &Request) -> Projected<Vec<E>> {
        self.projector
            .project_many(Vec::new(), &request.projection(&self.default_groups))
    }
}
