//! BlogPost Entity

use chrono::{DateTime, Utc};
use murmur_macros::DatabaseEntity;
use serde::Serialize;
use uuid::Uuid;

use super::User;
use crate::orm::{Entity, Publishable, Reference, Sluggable, Trashable, Uniqable};

/// BlogPost Entity - a long-form article
#[derive(DatabaseEntity, Clone, Debug, PartialEq, Serialize)]
#[entity(table = "blog_posts", trashable, publishable)]
pub struct BlogPost {
    #[entity(primary_key, groups("default"))]
    pub id: i64,

    #[entity(unique, groups("default"))]
    pub uuid: Option<String>,

    #[entity(unique, groups("default"))]
    pub slug: Option<String>,

    #[entity(groups("default"))]
    pub title: String,

    #[entity(groups("post-detail"))]
    pub body: String,

    #[entity(groups("default"), relation(expand("post-with-author")))]
    pub author: Reference<User>,

    #[entity(groups("default"))]
    pub published_at: Option<DateTime<Utc>>,

    #[entity(groups("trash"))]
    pub trashed_at: Option<DateTime<Utc>>,

    #[entity(groups("default"))]
    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl BlogPost {
    pub fn new(id: i64, title: impl Into<String>, author_id: i64) -> Self {
        Self {
            id,
            uuid: Some(Uuid::new_v4().to_string()),
            slug: None,
            title: title.into(),
            body: String::new(),
            author: Reference::Id(author_id),
            published_at: None,
            trashed_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

impl Trashable for BlogPost {
    fn trashed_at(&self) -> Option<DateTime<Utc>> {
        self.trashed_at
    }
}

impl Publishable for BlogPost {
    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }
}

impl Sluggable for BlogPost {
    fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

impl Uniqable for BlogPost {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
}

impl Entity for BlogPost {
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
