//! Integration tests for the retrieval façade over the in-memory store
//!
//! Covers:
//! - Default visibility and the trashed/unpublished inversion listings
//! - Not-found handling for "one" operations
//! - Criteria, ordering and pagination precedence
//! - Unique key and short uuid lookups
//! - JSON projection through the façade
//! - Sharing one model between concurrent callers

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::Value;

use murmur::entities::{Comment, MicroPost, User, default_registry};
use murmur::orm::{Criteria, OrderSpec, Reference, VisibilityFilter};
use murmur::uuid_codec;
use murmur::{
    Config, MemoryStore, MetadataRegistry, Model, ModelError, Projected, Request, UniqueKey,
};

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

/// A (published, active), B (unpublished, active), C (published, trashed)
fn scenario_posts() -> Vec<MicroPost> {
    vec![
        post(1, "a", true, false, 0),
        post(2, "b", false, false, 1),
        post(3, "c", true, true, 2),
    ]
}

type PostModel = Model<MicroPost, MemoryStore<MicroPost>>;

fn model_with(posts: Vec<MicroPost>) -> PostModel {
    Model::new(
        MemoryStore::with_entities(posts),
        Arc::new(default_registry()),
    )
}

fn ids(projected: Projected<Vec<MicroPost>>) -> Vec<i64> {
    projected
        .into_native()
        .expect("native result")
        .iter()
        .map(|p| p.id)
        .collect()
}

fn json(projected: &Projected<impl Sized>) -> Value {
    serde_json::from_str(projected.json().expect("json result")).unwrap()
}

// ============================================================================
// Visibility
// ============================================================================

mod visibility {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_scenario_listings() {
        let model = model_with(scenario_posts());
        let request = Request::new();

        assert_eq!(ids(model.find_all(&request).await.unwrap()), vec![1]);
        assert_eq!(ids(model.get_trashed_only(&request).await.unwrap()), vec![3]);
        assert_eq!(ids(model.get_unpublished_only(&request).await.unwrap()), vec![2]);
    }

    #[tokio::test]
    async fn test_default_policy_hides_trashed_and_unpublished() {
        let posts = vec![
            post(1, "a", true, false, 0),
            post(2, "b", false, false, 1),
            post(3, "c", true, true, 2),
            post(4, "d", false, true, 3),
            post(5, "e", true, false, 4),
        ];
        let model = model_with(posts);

        let visible = model
            .find_all(&Request::new())
            .await
            .unwrap()
            .into_native()
            .unwrap();

        assert_eq!(visible.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 5]);
        assert!(visible.iter().all(|p| p.trashed_at.is_none()));
        assert!(visible.iter().all(|p| p.published_at.is_some()));
    }

    #[tokio::test]
    async fn test_inversion_listings_are_newest_first() {
        let posts = vec![
            post(1, "a", true, true, 0),
            post(2, "b", false, false, 5),
            post(3, "c", true, true, 9),
            post(4, "d", false, false, 2),
            post(5, "e", true, true, 4),
        ];
        let model = model_with(posts);

        assert_eq!(
            ids(model.get_trashed_only(&Request::new()).await.unwrap()),
            vec![3, 5, 1]
        );
        assert_eq!(
            ids(model.get_unpublished_only(&Request::new()).await.unwrap()),
            vec![2, 4]
        );
    }

    #[tokio::test]
    async fn test_inversion_listings_ignore_the_other_dimension() {
        // trashed and never published
        let model = model_with(vec![post(1, "a", false, true, 0)]);

        assert_eq!(ids(model.get_trashed_only(&Request::new()).await.unwrap()), vec![1]);
        assert_eq!(
            ids(model.get_unpublished_only(&Request::new()).await.unwrap()),
            vec![1]
        );
        assert!(ids(model.find_all(&Request::new()).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_trashed_only_on_untrashable_entity_is_empty() {
        let model = Model::new(
            MemoryStore::with_entities(vec![User::new(1, "ada")]),
            Arc::new(default_registry()),
        );

        let trashed = model.get_trashed_only(&Request::new()).await.unwrap();
        assert_eq!(trashed.into_native().map(|u| u.len()), Some(0));

        let all = model.find_all(&Request::new()).await.unwrap();
        assert_eq!(all.into_native().map(|u| u.len()), Some(1));
    }

    #[tokio::test]
    async fn test_comments_have_no_publish_gate() {
        let mut trashed = Comment::new(2, "spam", 1, 1);
        trashed.trashed_at = Some(at(1));
        let model = Model::new(
            MemoryStore::with_entities(vec![Comment::new(1, "nice", 1, 1), trashed]),
            Arc::new(default_registry()),
        );

        let visible = model.find_all(&Request::new()).await.unwrap().into_native().unwrap();
        assert_eq!(visible.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);

        let unpublished = model.get_unpublished_only(&Request::new()).await.unwrap();
        assert_eq!(unpublished.into_native().map(|c| c.len()), Some(0));
    }

    #[tokio::test]
    async fn test_custom_filter_chain() {
        let filter = VisibilityFilter::with_defaults()
            .add_filter("popular", |p: &MicroPost, _| p.views >= 50);
        let posts = vec![post(1, "a", true, false, 0), post(5, "e", true, false, 1)];
        let model = model_with(posts).with_filter(filter);

        assert_eq!(ids(model.find_all(&Request::new()).await.unwrap()), vec![5]);
    }
}

// ============================================================================
// Single lookups
// ============================================================================

mod lookups {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_find_by_id() {
        let model = model_with(scenario_posts());
        let found = model.find_by_id(1, &Request::new()).await.unwrap();
        assert_eq!(found.into_native().map(|p| p.slug), Some(Some("a".to_string())));
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found() {
        let model = model_with(scenario_posts());
        let err = model.find_by_id(999, &Request::new()).await.unwrap_err();
        assert_matches!(err, ModelError::NotFound { kind: "MicroPost", ref key } if key == "999");
    }

    #[tokio::test]
    async fn test_trashed_id_is_not_found_by_default() {
        let model = model_with(scenario_posts());

        let err = model.find_by_id(3, &Request::new()).await.unwrap_err();
        assert!(err.is_not_found());

        let found = model
            .find_by_id(3, &Request::new().only_trashed())
            .await
            .unwrap();
        assert_eq!(found.into_native().map(|p| p.id), Some(3));
    }

    #[tokio::test]
    async fn test_find_by_unique_key() {
        let posts = scenario_posts();
        let uuid = posts[0].uuid.clone().unwrap();
        let model = model_with(posts);

        let by_slug = model
            .find_by_unique_key(&UniqueKey::slug("a"), &Request::new())
            .await
            .unwrap();
        assert_eq!(by_slug.into_native().map(|p| p.id), Some(1));

        let by_uuid = model
            .find_by_unique_key(&UniqueKey::uuid(uuid), &Request::new())
            .await
            .unwrap();
        assert_eq!(by_uuid.into_native().map(|p| p.id), Some(1));

        let err = model
            .find_by_unique_key(&UniqueKey::slug("b"), &Request::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_uuid_key_in_any_notation() {
        let posts = scenario_posts();
        let uuid = posts[0].uuid.clone().unwrap();
        let model = model_with(posts);

        for key in [uuid.to_uppercase(), format!("{{{}}}", uuid), uuid.replace('-', "")] {
            let found = model
                .find_by_unique_key(&UniqueKey::uuid(key), &Request::new())
                .await
                .unwrap();
            assert_eq!(found.into_native().map(|p| p.id), Some(1));
        }

        let err = model
            .find_by_unique_key(&UniqueKey::uuid("not-a-uuid"), &Request::new())
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));
    }

    #[tokio::test]
    async fn test_unique_key_the_entity_lacks_is_validation() {
        let model = Model::new(
            MemoryStore::with_entities(vec![Comment::new(1, "hi", 1, 1)]),
            Arc::new(default_registry()),
        );
        let err = model
            .find_by_unique_key(&UniqueKey::slug("hi"), &Request::new())
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));
    }

    #[tokio::test]
    async fn test_find_by_encoded_uuid() {
        let posts = scenario_posts();
        let uuid = uuid::Uuid::parse_str(posts[0].uuid.as_deref().unwrap()).unwrap();
        let model = model_with(posts);

        let found = model
            .find_by_encoded_uuid(&uuid_codec::encode(&uuid), &Request::new())
            .await
            .unwrap();
        assert_eq!(found.into_native().map(|p| p.id), Some(1));

        let err = model
            .find_by_encoded_uuid("not-base62!", &Request::new())
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));
    }
}

// ============================================================================
// Listings, criteria and pagination
// ============================================================================

mod listings {
    use super::*;
    use pretty_assertions::assert_eq;

    fn published(count: i64) -> Vec<MicroPost> {
        (1..=count).map(|id| post(id, &format!("p{}", id), true, false, id)).collect()
    }

    #[tokio::test]
    async fn test_find_many() {
        let model = model_with(scenario_posts());

        assert_eq!(ids(model.find_many(&[1, 2, 3], &Request::new()).await.unwrap()), vec![1]);
        assert!(ids(model.find_many(&[], &Request::new()).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_criteria_and_of_ors() {
        let model = model_with(published(6));
        let criteria = Criteria::new().any_of("views", [10, 20, 30]).eq("slug", "p2");

        assert_eq!(
            ids(model
                .find_by_criteria(&criteria, None, None, None, &Request::new())
                .await
                .unwrap()),
            vec![2]
        );
    }

    #[tokio::test]
    async fn test_order_limit_offset() {
        let model = model_with(published(6));
        let order = OrderSpec::new().desc("views");

        let found = model
            .find_by_criteria(&Criteria::new(), Some(&order), Some(2), Some(1), &Request::new())
            .await
            .unwrap();
        assert_eq!(ids(found), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_pagination() {
        let model = model_with(published(5));
        let order = OrderSpec::new().asc("id");

        let page = |n| Request::new().paginate(n, 2);
        let mut pages = Vec::new();
        for n in 1..=3 {
            pages.push(ids(model
                .find_by_criteria(&Criteria::new(), Some(&order), None, None, &page(n))
                .await
                .unwrap()));
        }
        assert_eq!(pages, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[tokio::test]
    async fn test_explicit_bounds_win_over_request_pagination() {
        let model = model_with(published(5));
        let order = OrderSpec::new().asc("id");

        let found = model
            .find_by_criteria(
                &Criteria::new(),
                Some(&order),
                Some(1),
                Some(4),
                &Request::new().paginate(1, 2),
            )
            .await
            .unwrap();
        assert_eq!(ids(found), vec![5]);
    }

    #[tokio::test]
    async fn test_default_page_size_comes_from_config() {
        let config = Config {
            per_page: 3,
            ..Config::default()
        };
        let model = model_with(published(5)).with_config(&config);

        let first = model.find_all(&Request::new().page(1)).await.unwrap();
        assert_eq!(first.into_native().map(|p| p.len()), Some(3));

        // no pagination requested: unbounded
        let all = model.find_all(&Request::new()).await.unwrap();
        assert_eq!(all.into_native().map(|p| p.len()), Some(5));
    }

    #[tokio::test]
    async fn test_bad_pagination_is_validation() {
        let model = model_with(published(2));

        let err = model.find_all(&Request::new().paginate(0, 10)).await.unwrap_err();
        assert_matches!(err, ModelError::Validation(_));

        let err = model.find_all(&Request::new().paginate(1, 0)).await.unwrap_err();
        assert_matches!(err, ModelError::Validation(_));

        let err = model.find_all(&Request::new().paginate(1, 1000)).await.unwrap_err();
        assert_matches!(err, ModelError::Validation(_));
    }

    #[tokio::test]
    async fn test_page_past_the_offset_range_is_validation() {
        let model = model_with(published(2));

        let err = model
            .find_all(&Request::new().paginate(i64::MAX, 10))
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));

        let far = model
            .find_all(&Request::new().paginate(i64::MAX / 10, 10))
            .await
            .unwrap();
        assert!(ids(far).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_field_is_validation_unknown_field_is_query() {
        let model = model_with(published(2));

        let err = model
            .find_by_criteria(&Criteria::new().eq("views or 1", 1), None, None, None, &Request::new())
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));

        let err = model
            .find_by_criteria(&Criteria::new().eq("colour", "red"), None, None, None, &Request::new())
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Query(_));
    }

    #[tokio::test]
    async fn test_find_many_by_unique_keys() {
        let posts = published(4);
        let uuid = posts[2].uuid.clone().unwrap();
        let model = model_with(posts);

        let keys = vec![
            UniqueKey::slug("p1"),
            UniqueKey::uuid(uuid),
            UniqueKey::slug("p3"),
            UniqueKey::slug("missing"),
        ];
        let found = model.find_many_by_unique_keys(&keys, &Request::new()).await.unwrap();
        assert_eq!(ids(found), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_find_many_by_unique_keys_orders_by_id_and_paginates() {
        let posts = published(4);
        let uuid = posts[0].uuid.clone().unwrap();
        let model = model_with(posts);

        let keys = vec![
            UniqueKey::slug("p4"),
            UniqueKey::slug("p2"),
            UniqueKey::uuid(uuid),
        ];
        let all = model.find_many_by_unique_keys(&keys, &Request::new()).await.unwrap();
        assert_eq!(ids(all), vec![1, 2, 4]);

        let second = model
            .find_many_by_unique_keys(&keys, &Request::new().paginate(2, 2))
            .await
            .unwrap();
        assert_eq!(ids(second), vec![4]);

        let err = model
            .find_many_by_unique_keys(&keys, &Request::new().paginate(0, 2))
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));
    }

    #[tokio::test]
    async fn test_find_many_by_encoded_uuids() {
        let posts = published(3);
        let encoded: Vec<String> = posts
            .iter()
            .take(2)
            .map(|p| uuid_codec::encode(&uuid::Uuid::parse_str(p.uuid.as_deref().unwrap()).unwrap()))
            .collect();
        let model = model_with(posts);

        let refs: Vec<&str> = encoded.iter().map(String::as_str).collect();
        let found = model.find_many_by_encoded_uuids(&refs, &Request::new()).await.unwrap();
        let mut found = ids(found);
        found.sort();
        assert_eq!(found, vec![1, 2]);

        let err = model
            .find_many_by_encoded_uuids(&[refs[0], "%%"], &Request::new())
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Validation(_));
    }

    #[tokio::test]
    async fn test_count_by_criteria() {
        let model = model_with(scenario_posts());

        assert_eq!(model.count_by_criteria(&Criteria::new(), &Request::new()).await.unwrap(), 1);
        assert_eq!(
            model
                .count_by_criteria(&Criteria::new(), &Request::new().only_trashed())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            model
                .count_by_criteria(&Criteria::new().eq("slug", "a"), &Request::new().only_unpublished())
                .await
                .unwrap(),
            0
        );
    }
}

// ============================================================================
// Projection through the façade
// ============================================================================

mod projection {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_native_by_default() {
        let posts = scenario_posts();
        let expected = posts[0].clone();
        let model = model_with(posts);

        let found = model.find_by_id(1, &Request::new()).await.unwrap();
        assert_eq!(found, Projected::Native(expected));
    }

    #[tokio::test]
    async fn test_json_one_and_many() {
        let model = model_with(scenario_posts());

        let one = model.find_by_id(1, &Request::new().json()).await.unwrap();
        let value = json(&one);
        assert_eq!(value["id"], Value::from(1));
        assert_eq!(value["author"], Value::from(1));
        assert!(value.get("views").is_none());

        let many = model.find_all(&Request::new().json().group("stats")).await.unwrap();
        let value = json(&many);
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert_eq!(value[0]["views"], Value::from(10));
    }

    #[tokio::test]
    async fn test_empty_listing_is_an_empty_array() {
        let model = model_with(Vec::new());
        let many = model.find_all(&Request::new().json()).await.unwrap();
        assert_eq!(json(&many), Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn test_config_default_groups_apply() {
        let config = Config {
            default_groups: vec!["stats".to_string()],
            ..Config::default()
        };
        let model = model_with(scenario_posts()).with_config(&config);

        let one = model.find_by_id(1, &Request::new().json()).await.unwrap();
        assert_eq!(json(&one)["views"], Value::from(10));
    }

    #[tokio::test]
    async fn test_groups_apply_without_registered_kinds() {
        let model = Model::new(
            MemoryStore::with_entities(vec![User::new(1, "ada")]),
            Arc::new(MetadataRegistry::new()),
        );

        let value = json(&model.find_by_id(1, &Request::new().json()).await.unwrap());
        assert_eq!(value["username"], Value::from("ada"));
        assert!(value.get("email").is_none());
        assert!(value.get("active").is_none());

        let value = json(&model.find_all(&Request::new().json().group("administer")).await.unwrap());
        assert_eq!(value[0]["email"], Value::from("ada@localhost"));
    }

    #[tokio::test]
    async fn test_nested_expansion_with_partial_registry() {
        let mut author = User::new(7, "grace");
        author.email = "grace@example.com".to_string();
        let mut post = post(1, "a", true, false, 0);
        post.author = Reference::load(author);

        let registry = MetadataRegistry::new().with::<MicroPost>();
        let model = Model::new(MemoryStore::with_entities(vec![post]), Arc::new(registry));

        let expanded = json(
            &model
                .find_by_id(1, &Request::new().json().group("post-with-author"))
                .await
                .unwrap(),
        );
        assert!(expanded.get("views").is_none());
        assert_eq!(expanded["author"]["username"], Value::from("grace"));
        assert!(expanded["author"].get("email").is_none());

        let shallow = json(&model.find_by_id(1, &Request::new().json()).await.unwrap());
        assert_eq!(shallow["author"], Value::from(7));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_requests_do_not_leak_between_calls() {
        let model = Arc::new(model_with(scenario_posts()));

        let trashed_request = Request::new().only_trashed().json();
        let default_request = Request::new();

        let (trashed, visible) = tokio::join!(
            model.find_all(&trashed_request),
            model.find_all(&default_request)
        );

        assert!(trashed.unwrap().is_json());
        assert_eq!(ids(visible.unwrap()), vec![1]);

        // a later call starts from defaults again
        assert_eq!(ids(model.find_all(&Request::new()).await.unwrap()), vec![1]);
    }

    #[tokio::test]
    async fn test_shared_model_across_tasks() {
        let model = Arc::new(model_with(scenario_posts()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let model = Arc::clone(&model);
                tokio::spawn(async move {
                    let request = if i % 2 == 0 {
                        Request::new()
                    } else {
                        Request::new().only_unpublished()
                    };
                    ids(model.find_all(&request).await.unwrap())
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let expected = if i % 2 == 0 { vec![1] } else { vec![2] };
            assert_eq!(handle.await.unwrap(), expected);
        }
    }

    #[test]
    fn test_blocking_call() {
        let model = model_with(scenario_posts());
        let found = tokio_test::block_on(model.find_by_id(1, &Request::new()));
        assert!(found.is_ok());
    }
}
