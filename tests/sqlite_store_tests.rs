//! Integration tests for the SQLite store
//!
//! Runs the retrieval pipeline against real SQLite (in memory, and once
//! against a file) to check that the rendered SQL agrees with the in-memory
//! semantics: visibility pushdown, AND-of-OR criteria, ordering, bounds and
//! backend errors.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::Value;

use murmur::entities::{Comment, MicroPost, User, default_registry};
use murmur::orm::{Criteria, CriteriaBuilder, DatabaseEntity, OrderSpec, VisibilityPolicy};
use murmur::{Database, Model, ModelError, Projected, Request, SqliteStore, Store, UniqueKey};

// ============================================================================
// Fixtures
// ============================================================================

fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::hours(hours)
}

fn post(id: i64, slug: &str, published: bool, trashed: bool, created_hour: i64) -> MicroPost {
    let mut post = MicroPost::new(id, format!("post {}", slug), 1);
    post.slug = Some(slug.to_string());
    post.created_at = at(created_hour);
    post.views = id * 10;
    if published {
        post.published_at = Some(at(created_hour));
    }
    if trashed {
        post.trashed_at = Some(at(created_hour + 1));
    }
    post
}

async fn seeded(posts: &[MicroPost]) -> Model<MicroPost, SqliteStore<MicroPost>> {
    let db = Database::in_memory().await.unwrap();

    let users: SqliteStore<User> = db.store();
    users.create_table().await.unwrap();
    users.insert(&User::new(1, "ada")).await.unwrap();

    let store: SqliteStore<MicroPost> = db.store();
    store.create_table().await.unwrap();
    for post in posts {
        store.insert(post).await.unwrap();
    }

    Model::new(store, Arc::new(default_registry()))
}

fn scenario_posts() -> Vec<MicroPost> {
    vec![
        post(1, "a", true, false, 0),
        post(2, "b", false, false, 1),
        post(3, "c", true, true, 2),
    ]
}

fn ids(projected: Projected<Vec<MicroPost>>) -> Vec<i64> {
    projected
        .into_native()
        .expect("native result")
        .iter()
        .map(|p| p.id)
        .collect()
}

// ============================================================================
// Round trip through rows
// ============================================================================

#[tokio::test]
async fn test_rows_decode_back_to_entities() {
    let posts = scenario_posts();
    let model = seeded(&posts).await;

    let found = model
        .find_by_id(1, &Request::new())
        .await
        .unwrap()
        .into_native()
        .unwrap();

    assert_eq!(found, posts[0]);
    assert_eq!(found.author.id(), 1);
}

// ============================================================================
// Visibility pushdown
// ============================================================================

#[tokio::test]
async fn test_scenario_listings() {
    let model = seeded(&scenario_posts()).await;

    assert_eq!(ids(model.find_all(&Request::new()).await.unwrap()), vec![1]);
    assert_eq!(ids(model.get_trashed_only(&Request::new()).await.unwrap()), vec![3]);
    assert_eq!(ids(model.get_unpublished_only(&Request::new()).await.unwrap()), vec![2]);
}

#[tokio::test]
async fn test_inversion_listings_are_newest_first() {
    let model = seeded(&[
        post(1, "a", true, true, 0),
        post(2, "b", false, false, 5),
        post(3, "c", true, true, 9),
        post(4, "d", false, false, 2),
        post(5, "e", false, true, 4),
    ])
    .await;

    assert_eq!(
        ids(model.get_trashed_only(&Request::new()).await.unwrap()),
        vec![3, 5, 1]
    );
    assert_eq!(
        ids(model.get_unpublished_only(&Request::new()).await.unwrap()),
        vec![2, 5, 4]
    );
}

#[tokio::test]
async fn test_not_found() {
    let model = seeded(&scenario_posts()).await;

    let err = model.find_by_id(999, &Request::new()).await.unwrap_err();
    assert!(err.is_not_found());

    let err = model.find_by_id(3, &Request::new()).await.unwrap_err();
    assert!(err.is_not_found());

    let err = model
        .find_by_unique_key(&UniqueKey::slug("b"), &Request::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let found = model
        .find_by_unique_key(&UniqueKey::slug("b"), &Request::new().only_unpublished())
        .await
        .unwrap();
    assert_eq!(found.into_native().map(|p| p.id), Some(2));
}

#[tokio::test]
async fn test_uppercase_uuid_lookup() {
    let posts = scenario_posts();
    let uuid = posts[0].uuid.clone().unwrap();
    let model = seeded(&posts).await;

    let found = model
        .find_by_unique_key(&UniqueKey::uuid(uuid.to_uppercase()), &Request::new())
        .await
        .unwrap();
    assert_eq!(found.into_native().map(|p| p.id), Some(1));
}

#[tokio::test]
async fn test_store_applies_pushed_down_conditions() {
    let model = seeded(&scenario_posts()).await;
    let query = CriteriaBuilder::new(MicroPost::metadata())
        .with_visibility(VisibilityPolicy::default())
        .build(&Criteria::new(), None, None, None)
        .unwrap();

    // the store alone, without the in-memory safety net
    let rows = model.store().fetch(&query).await.unwrap();
    assert_eq!(rows.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);
    assert_eq!(model.store().count(&query).await.unwrap(), 1);
}

// ============================================================================
// Criteria, order and bounds
// ============================================================================

#[tokio::test]
async fn test_and_of_ors() {
    let posts: Vec<MicroPost> = (1..=6)
        .map(|id| post(id, &format!("p{}", id), true, false, id))
        .collect();
    let model = seeded(&posts).await;

    let criteria = Criteria::new()
        .any_of("views", [10, 20, 30])
        .any_of("slug", ["p2", "p3", "p4"]);
    let order = OrderSpec::new().asc("id");

    let found = model
        .find_by_criteria(&criteria, Some(&order), None, None, &Request::new())
        .await
        .unwrap();
    assert_eq!(ids(found), vec![2, 3]);

    let count = model
        .count_by_criteria(&criteria, &Request::new())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_relation_criteria_use_the_foreign_key() {
    let mut other = post(2, "b", true, false, 1);
    other.author = murmur::orm::Reference::Id(7);
    let model = seeded(&[post(1, "a", true, false, 0), other]).await;

    let found = model
        .find_by_criteria(&Criteria::new().eq("author", 7), None, None, None, &Request::new())
        .await
        .unwrap();
    assert_eq!(ids(found), vec![2]);
}

#[tokio::test]
async fn test_pagination_and_offset_only() {
    let posts: Vec<MicroPost> = (1..=5)
        .map(|id| post(id, &format!("p{}", id), true, false, id))
        .collect();
    let model = seeded(&posts).await;
    let order = OrderSpec::new().desc("created_at");

    let page_two = model
        .find_by_criteria(&Criteria::new(), Some(&order), None, None, &Request::new().paginate(2, 2))
        .await
        .unwrap();
    assert_eq!(ids(page_two), vec![3, 2]);

    let skipped = model
        .find_by_criteria(&Criteria::new(), Some(&order), None, Some(3), &Request::new())
        .await
        .unwrap();
    assert_eq!(ids(skipped), vec![2, 1]);
}

#[tokio::test]
async fn test_empty_id_set_matches_nothing() {
    let model = seeded(&scenario_posts()).await;
    let found = model.find_many(&[], &Request::new()).await.unwrap();
    assert!(ids(found).is_empty());
}

#[tokio::test]
async fn test_unknown_column_is_query_error() {
    let model = seeded(&scenario_posts()).await;

    let err = model
        .find_by_criteria(&Criteria::new().eq("colour", "red"), None, None, None, &Request::new())
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::Query(_));

    let order = OrderSpec::new().asc("colour");
    let err = model
        .find_by_criteria(&Criteria::new(), Some(&order), None, None, &Request::new())
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::Query(_));
}

// ============================================================================
// Projection and other entities
// ============================================================================

#[tokio::test]
async fn test_json_projection() {
    let model = seeded(&scenario_posts()).await;

    let projected = model
        .find_all(&Request::new().json().groups(["stats", "trash"]))
        .await
        .unwrap();
    let value: Value = serde_json::from_str(projected.json().unwrap()).unwrap();

    assert_eq!(value[0]["id"], Value::from(1));
    assert_eq!(value[0]["views"], Value::from(10));
    assert_eq!(value[0]["trashed_at"], Value::Null);
    assert_eq!(value[0]["created_at"], Value::from("2024-03-01T09:00:00Z"));
    assert!(value[0].get("updated_at").is_none());
}

#[tokio::test]
async fn test_comments_over_sqlite() {
    let db = Database::in_memory().await.unwrap();
    let store: SqliteStore<Comment> = db.store();
    store.create_table().await.unwrap();

    let mut trashed = Comment::new(2, "spam", 1, 1);
    trashed.trashed_at = Some(at(3));
    store.insert(&Comment::new(1, "nice", 1, 1)).await.unwrap();
    store.insert(&trashed).await.unwrap();

    let model = Model::new(store, Arc::new(default_registry()));
    let visible = model.find_all(&Request::new()).await.unwrap().into_native().unwrap();
    assert_eq!(visible.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);

    let trash = model.get_trashed_only(&Request::new()).await.unwrap().into_native().unwrap();
    assert_eq!(trash.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn test_file_backed_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("murmur.db");

    {
        let db = Database::connect(&path, 2).await.unwrap();
        let store: SqliteStore<User> = db.store();
        store.create_table().await.unwrap();
        store.insert(&User::new(1, "ada")).await.unwrap();
        db.pool().close().await;
    }
    assert!(path.exists());

    let db = Database::connect(&path, 2).await.unwrap();
    let model = Model::new(db.store::<User>(), Arc::new(default_registry()));
    let user = model
        .find_by_id(1, &Request::new())
        .await
        .unwrap()
        .into_native()
        .unwrap();
    assert_eq!(user.username, "ada");
}
