//! # Mass Nuke
//!
//! Discovery of recently created pages for bulk deletion review.
//!
//! Given an actor (or none), a title pattern, a namespace set and a date
//! range, discovery builds one read-only, fully parameterized query against
//! one of two creation indexes, then lets registered extension sources adjust
//! the rows before the result cap is re-applied.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Request   │──▶│ Resolvers  │──▶│ QueryBuilder │──▶│  SQLite   │
//! │ (CLI/API)  │   │ actor/time │   │  + patterns  │   │ revisions │
//! └────────────┘   └────────────┘   └──────────────┘   │ rec. chg. │
//!                                                       └─────┬─────┘
//!                                   ┌──────────────┐          │
//!                                   │  Extensions  │◀─────────┘
//!                                   │ + final cap  │
//!                                   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`actors`] | Merge a target with its linked actors |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`discover`] | The discovery entry point and CLI renderer |
//! | [`error`] | Discovery error taxonomy |
//! | [`extension`] | Extension sources and final truncation |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Core data types |
//! | [`pattern`] | Title patterns and capitalization folding |
//! | [`query`] | Creation indexes and the query builder |
//! | [`record`] | Recording and pruning change events |
//! | [`time_window`] | Max-age and date range resolution |

pub mod actors;
pub mod config;
pub mod db;
pub mod discover;
pub mod error;
pub mod extension;
pub mod migrate;
pub mod models;
pub mod pattern;
pub mod query;
pub mod record;
pub mod time_window;
