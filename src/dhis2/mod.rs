//! DHIS2 web API access.
//!
//! Jobs talk to DHIS2 only through [`RemoteDataClient`], so they can run
//! against an in-memory fake in tests.

pub mod analytics;
mod cache;
mod client;
#[cfg(test)]
pub mod fake;
pub mod index;
pub mod metadata;
pub mod periods;

pub use client::Dhis2Client;
pub use index::MetadataIndex;

use crate::entities::EntityKind;
use crate::model::{BatchLimits, ExtractionRequest};
use crate::table::Record;
use anyhow::Result;

#[allow(async_fn_in_trait)]
pub trait RemoteDataClient {
    fn base_url(&self) -> &str;

    /// Analytics values for the request, fetched in batches capped by `limits`.
    async fn analytics(
        &self,
        request: &ExtractionRequest,
        limits: &BatchLimits,
    ) -> Result<Vec<Record>>;

    /// All records of one metadata entity kind.
    async fn metadata(&self, kind: EntityKind) -> Result<Vec<Record>>;
}
