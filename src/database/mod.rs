//! Relational store access.
//!
//! # Data Flow
//! ```text
//! products handler
//!     → store.rs (fixed query, bounded by the query timeout)
//!     → marshal.rs (rows → ordered column/value lists)
//!     → JSON array
//! ```
//!
//! # Design Decisions
//! - One shared pool; the pool does its own locking
//! - Row shape is discovered at query time, never fixed at compile time
//! - Any decode failure aborts the whole result
//! - Columns arrive as text, so types without a coercion still render

pub mod marshal;
pub mod store;

pub use marshal::{marshal_rows, DecodeRow, MarshalError, ProductRow, Value};
pub use store::{fetch_recent_products, PgProductStore, ProductStore, StoreError, MAX_PRODUCTS};
