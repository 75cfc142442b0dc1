//! # Schema Drift Core
//!
//! Pure logic for turning mixed-format text into versioned schemas:
//! fragment detection, normalization, inference, evolution tracking, and
//! rendering, plus the schema store abstraction.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Persistence
//! backends implement [`store::SchemaStore`] outside of it.
//!
//! ```text
//! text ──detect──▶ fragments ──normalize──▶ records ──infer──▶ schema
//!                                                               │
//!                                              tracker.record ◀─┘
//! ```

pub mod detect;
pub mod error;
pub mod evolve;
pub mod infer;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod store;
