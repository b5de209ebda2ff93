//! # Pareto Compare
//!
//! Multi-criteria product comparison. Given a category and weighted
//! criteria, computes the Pareto frontier of the category's products, ranks
//! it by weighted normalized score, and caches the result per request
//! fingerprint.
//!
//! The algorithms live in the `pareto-core` crate; this crate wires them to
//! SQLite, a single-flight cache, an HTTP API, and the `pareto` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────────────────┐
//! │  import  │──▶│    SQLite     │──▶│ Comparator                │
//! │  (JSON)  │   │   catalog     │   │ filter→extract→dominance  │
//! └──────────┘   └──────────────┘   │ →rank (blocking worker)    │
//!                                   └─────────────┬─────────────┘
//!                                                 │ single-flight cache
//!                                  ┌──────────────┴───────┐
//!                                  ▼                      ▼
//!                             ┌──────────┐          ┌──────────┐
//!                             │   CLI    │          │   HTTP   │
//!                             │ (pareto) │          │  (axum)  │
//!                             └──────────┘          └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_catalog`] | SQLite-backed catalog |
//! | [`import`] | JSON catalog import |
//! | [`cache`] | Single-flight comparison cache |
//! | [`compare`] | Request validation and orchestration |
//! | [`server`] | HTTP server |

pub mod cache;
pub mod compare;
pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod sqlite_catalog;
