//! MicroPost Entity

use chrono::{DateTime, Utc};
use murmur_macros::DatabaseEntity;
use serde::Serialize;
use uuid::Uuid;

use super::User;
use crate::orm::{Entity, Publishable, Reference, Sluggable, Trashable, Uniqable};

/// MicroPost Entity - a short status post
#[derive(DatabaseEntity, Clone, Debug, PartialEq, Serialize)]
#[entity(table = "micro_posts", trashable, publishable)]
pub struct MicroPost {
    #[entity(primary_key, groups("default"))]
    pub id: i64,

    #[entity(unique, groups("default"))]
    pub uuid: Option<String>,

    #[entity(unique, groups("default"))]
    pub slug: Option<String>,

    #[entity(groups("default"))]
    pub body: String,

    #[entity(groups("default"), relation(expand("post-with-author")))]
    pub author: Reference<User>,

    #[entity(groups("stats"))]
    pub views: i64,

    #[entity(groups("default"))]
    pub published_at: Option<DateTime<Utc>>,

    #[entity(groups("trash"))]
    pub trashed_at: Option<DateTime<Utc>>,

    #[entity(groups("default"))]
    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl MicroPost {
    /// A fresh unpublished post with a random uuid
    pub fn new(id: i64, body: impl Into<String>, author_id: i64) -> Self {
        Self {
            id,
            uuid: Some(Uuid::new_v4().to_string()),
            slug: None,
            body: body.into(),
            author: Reference::Id(author_id),
            views: 0,
            published_at: None,
            trashed_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

impl Trashable for MicroPost {
    fn trashed_at(&self) -> Option<DateTime<Utc>> {
        self.trashed_at
    }
}

impl Publishable for MicroPost {
    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }
}

impl Sluggable for MicroPost {
    fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

impl Uniqable for MicroPost {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
}

impl Entity for MicroPost {
    fn as_trashable(&self) -> Option<&dyn Trashable> {
        Some(self)
    }

    fn as_publishable(&self) -> Option<&dyn Publishable> {
        Some(self)
    }

    fn as_sluggable(&self) -> Option<&dyn Sluggable> {
        Some(self)
    }

    fn as_uniqable(&self) -> Option<&dyn Uniqable> {
        Some(self)
    }
}
