//! Comment Entity

use chrono::{DateTime, Utc};
use murmur_macros::DatabaseEntity;
use serde::Serialize;

use super::{MicroPost, User};
use crate::orm::{Entity, Reference, Trashable};

/// Comment Entity - a reply on a micro-post. Comments are never drafts.
#[derive(DatabaseEntity, Clone, Debug, PartialEq, Serialize)]
#[entity(table = "comments", trashable)]
pub struct Comment {
    #[entity(primary_key, groups("default"))]
    pub id: i64,

    #[entity(groups("default"))]
    pub body: String,

    #[entity(groups("default"), relation(expand("comment-with-post")))]
    pub micro_post: Reference<MicroPost>,

    #[entity(groups("default"), relation(expand("comment-with-author")))]
    pub author: Reference<User>,

    #[entity(groups("trash"))]
    pub trashed_at: Option<DateTime<Utc>>,

    #[entity(groups("default"))]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(id: i64, body: impl Into<String>, micro_post_id: i64, author_id: i64) -> Self {
        Self {
            id,
            body: body.into(),
            micro_post: Reference::Id(micro_post_id),
            author: Reference::Id(author_id),
            trashed_at: None,
            created_at: Utc::now(),
        }
    }
}

impl Trashable for Comment {
    fn trashed_at(&self) -> Option<DateTime<Utc>> {
        self.trashed_at
    }
}

impl Entity for Comment {
    fn as_trashable(&self) -> Option<&dyn Trashable> {
        Some(self)
    }
}
