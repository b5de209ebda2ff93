//! Catalog abstraction: the collaborator that supplies candidate products.
//!
//! The comparison path only ever reads from the catalog, through
//! [`Catalog::fetch_candidates`]. Implementations may use the filters to
//! narrow their query, but the orchestrator re-applies every filter itself,
//! so a catalog that ignores them is still correct.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CandidateRecord, Filters};

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns every product (or variant) of the category with all its offers.
    async fn fetch_candidates(
        &self,
        category_id: &str,
        filters: &Filters,
    ) -> Result<Vec<CandidateRecord>>;
}
