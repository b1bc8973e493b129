//! Trait seams for the external collaborators
//!
//! The orchestrator core only talks to the outside world through these
//! traits. Each carries a mockall annotation so scheduler and orchestrator
//! behavior can be tested without any network access.

use crate::error::Result;
use crate::types::{BusinessRecord, LocationNode};

/// Produces raw business records for a rendered search query.
///
/// Implemented today over HTTP against the maps search page; the
/// orchestrator never looks inside a record beyond its identity key and
/// category, and does not retry at the parsing level; transient and
/// permanent failures alike surface as a single error per call.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BusinessFetcher: Send + Sync {
    /// Fetch the finite list of businesses matching `query`.
    ///
    /// `country_code` scopes the search to one country and feeds
    /// provenance; the rendered query already names the leaf location.
    async fn fetch(&self, query: &str, country_code: &str) -> Result<Vec<BusinessRecord>>;
}

/// Supplies the country → state → city hierarchy from an external lookup.
#[mockall::automock]
#[async_trait::async_trait]
pub trait LocationDirectory: Send + Sync {
    /// Resolve an ISO-2 code into a country node.
    async fn country(&self, code: &str) -> Result<LocationNode>;

    /// List the states of a country.
    async fn states(&self, country: &LocationNode) -> Result<Vec<LocationNode>>;

    /// List the cities of a state.
    async fn cities(&self, country: &LocationNode, state: &LocationNode)
        -> Result<Vec<LocationNode>>;
}

/// Rewrites a query into a country's primary language. Best effort: callers
/// fall back to the original query on any error.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, query: &str, country_code: &str) -> Result<String>;
}
