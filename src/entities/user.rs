//! User Entity

use chrono::{DateTime, Utc};
use murmur_macros::DatabaseEntity;
use serde::Serialize;

use crate::orm::Entity;

/// User Entity - an account that authors posts and comments
#[derive(DatabaseEntity, Clone, Debug, PartialEq, Serialize)]
#[entity(table = "users")]
pub struct User {
    #[entity(primary_key, groups("default"))]
    pub id: i64,

    #[entity(unique, groups("default"))]
    pub username: String,

    #[entity(groups("administer"))]
    pub email: String,

    #[entity(groups("administer"))]
    pub active: bool,

    #[entity(groups("default"))]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id,
            email: format!("{}@localhost", username),
            username,
            active: true,
            created_at: Utc::now(),
        }
    }
}

impl Entity for User {}
