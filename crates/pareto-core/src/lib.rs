//! # Pareto Compare Core
//!
//! Runtime-free logic for Pareto Compare: request and catalog models,
//! candidate pre-filtering, criterion extraction, the dominance engine,
//! frontier ranking, request fingerprinting, and the collaborator traits
//! (catalog and cache store) with in-memory implementations.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. The application
//! crate wires these pieces to real collaborators and adds the single-flight
//! comparison cache.
//!
//! ## Pipeline
//!
//! ```text
//! CandidateRecord ──▶ filter ──▶ extract ──▶ dominance ──▶ rank ──▶ ComparisonResult
//!                    (offers)   (values)    (frontier)   (order)
//! ```

pub mod cache_store;
pub mod catalog;
pub mod dominance;
pub mod engine;
pub mod error;
pub mod extract;
pub mod filter;
pub mod fingerprint;
pub mod models;
pub mod rank;
