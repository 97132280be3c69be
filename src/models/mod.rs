//! Data models for the theme sync pipeline.
//!
//! Plain structs decoupled from persistence; the repositories in `db` own all
//! row mapping.

mod job;
mod metadata;
mod theme;

pub use job::*;
pub use metadata::*;
pub use theme::*;
