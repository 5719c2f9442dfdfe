//! Retrieval ORM layer
//!
//! Building blocks shared by every entity type:
//! - static entity metadata and the traits generated by `murmur-macros`
//! - criteria and ordering
//! - query descriptions and their SQLite rendering
//! - visibility rules (trashed / unpublished)
//! - pagination arithmetic
//!
//! ```rust,ignore
//! use murmur::orm::{Criteria, CriteriaBuilder, OrderSpec, VisibilityPolicy};
//!
//! let query = CriteriaBuilder::new(MicroPost::metadata())
//!     .with_visibility(VisibilityPolicy::default())
//!     .build(
//!         &Criteria::new().any_of("views", [1, 2]).eq("author", 7),
//!         Some(&OrderSpec::new().desc("created_at")),
//!         Some(10),
//!         None,
//!     )?;
//! ```

mod builder;
mod criteria;
pub mod pagination;
mod traits;
mod visibility;

pub use builder::*;
pub use criteria::*;
pub use pagination::{PageRequest, paginate};
pub use traits::*;
pub use visibility::*;
