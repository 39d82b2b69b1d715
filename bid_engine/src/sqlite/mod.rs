//! SQLite backend for the bid engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
