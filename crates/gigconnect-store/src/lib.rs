//! # gigconnect-store
//!
//! The append-only message log behind the Gigconnect messaging engine.
//!
//! Two backends implement [`MessageStore`]: [`MemoryStore`] keeps the log in
//! process memory, and [`SqliteStore`] persists it through a synchronous
//! [`Database`] handle that wraps a `rusqlite::Connection`.  Both are the only
//! place message identity and creation time are assigned.

pub mod database;
pub mod memory;
pub mod message_store;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod sqlite;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use message_store::MessageStore;
pub use models::*;
pub use sqlite::SqliteStore;
