//! Shared primitives: errors, hashing, identifiers, configuration and the SQLite store.

pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod schemas;
pub mod store;
pub mod time;
