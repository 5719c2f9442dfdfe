//! murmur
//!
//! Entity retrieval for the murmur content platform: criteria building,
//! trashed/unpublished visibility rules, pagination and group-gated JSON
//! projection, over SQLite or an in-memory store.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use murmur::{Database, Model, Request, entities::{MicroPost, default_registry}};
//!
//! let db = Database::connect(&config.database_path, config.max_connections).await?;
//! let posts = Model::new(db.store::<MicroPost>(), Arc::new(default_registry()));
//!
//! let latest = posts.find_all(&Request::new().page(1)).await?;
//! let trash = posts.get_trashed_only(&Request::new().json()).await?;
//! ```

// Lets `#[derive(DatabaseEntity)]` refer to `::murmur` from inside this crate.
extern crate self as murmur;

pub mod config;
pub mod entities;
pub mod error;
pub mod model;
pub mod orm;
pub mod projection;
pub mod registry;
pub mod store;
pub mod uuid_codec;

pub use config::Config;
pub use error::{ModelError, Result};
pub use model::{Model, Request, UniqueKey};
pub use murmur_macros::DatabaseEntity;
pub use projection::{Projected, ProjectionSpec, Projector};
pub use registry::MetadataRegistry;
pub use store::{Database, MemoryStore, SqliteStore, Store};

// Used by generated row decoders
pub use sqlx;
