//! Content entities
//!
//! Each entity derives its static metadata with `#[derive(DatabaseEntity)]`
//! and opts into capabilities (`Trashable`, `Publishable`, `Sluggable`,
//! `Uniqable`) through its `Entity` impl.

mod blog_post;
mod comment;
mod micro_post;
mod user;

pub use blog_post::BlogPost;
pub use comment::Comment;
pub use micro_post::MicroPost;
pub use user::User;

use crate::registry::MetadataRegistry;

/// Registry with every entity in this module.
pub fn default_registry() -> MetadataRegistry {
    MetadataRegistry::new()
        .with::<User>()
        .with::<MicroPost>()
        .with::<BlogPost>()
        .with::<Comment>()
}
