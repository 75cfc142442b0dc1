//! # Schema Drift
//!
//! Track how the shape of loosely structured documents changes over time.
//!
//! Each ingest splits a text buffer into JSON, HTML table, CSV, key-value,
//! and prose fragments, flattens the structured ones into records, infers
//! one typed schema for the buffer, and appends it to the source's
//! versioned history in SQLite. The format-independent pipeline lives in
//! the `schema-drift-core` crate; this crate adds configuration, storage,
//! file discovery, and the `drift` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ Files/dirs  │──▶│ schema-drift-core    │──▶│   SQLite     │
//! │ (walkdir)   │   │ detect→normalize→    │   │ schema       │
//! └─────────────┘   │ infer→evolve         │   │ versions     │
//!                   └──────────────────────┘   └──────┬───────┘
//!                                                     │
//!                          ┌──────────────────────────┤
//!                          ▼                          ▼
//!                    ┌──────────┐              ┌────────────┐
//!                    │ history  │              │  render    │
//!                    │ diff     │              │ DDL / JSON │
//!                    └──────────┘              └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! drift init                          # create database
//! drift ingest ./drops                # ingest a directory
//! drift history orders.json           # list versions
//! drift diff orders.json              # latest vs previous
//! drift render orders.json --target relational
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Table creation |
//! | [`sqlite_store`] | SQLite schema history store |
//! | [`ingest`] | File discovery and ingest |
//! | [`detect_cmd`] | Fragment inspection |
//! | [`history`] | History, diff, and migration queries |
//! | [`render_cmd`] | Rendering stored schemas |
//! | [`sources`] | Source listing |

pub mod config;
pub mod db;
pub mod detect_cmd;
pub mod history;
pub mod ingest;
pub mod migrate;
pub mod render_cmd;
pub mod sources;
pub mod sqlite_store;
