//! Storage module - SQLite-backed graph persistence
//!
//! Exposes the graph store contract: node/edge CRUD, indexed queries,
//! durability (`sync`), and lifecycle (`close`).

pub mod migrations;
mod sqlite;

pub use sqlite::{GraphStats, GraphStore, NodePredicate, Result, StoreError};
