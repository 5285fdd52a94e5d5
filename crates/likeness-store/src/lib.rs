//! likeness-store — SQLite-backed [`likeness_core::TemplateStore`].

pub mod sqlite;

pub use sqlite::{EnrolledIdentity, SqliteTemplateStore};
