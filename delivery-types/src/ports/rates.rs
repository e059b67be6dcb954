//! Exchange rate ports.
//!
//! A provider fetches a fresh USD rate from an external quote source;
//! a cache holds the last fetched value until its TTL elapses.

use std::time::Duration;

use crate::domain::Rate;

/// Error type for rate lookups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    /// Network failure, timeout, or non-success status from the quote source.
    #[error("Rate source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The quote source answered, but not with a usable rate.
    #[error("Malformed rate response: {0}")]
    MalformedResponse(String),
}

/// Port trait for external rate sources.
///
/// Implementations perform a single attempt; retry policy belongs to the caller.
#[async_trait::async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches the current USD rate.
    async fn fetch(&self) -> Result<Rate, RateError>;
}

/// Port trait for the shared single-key rate cache.
#[async_trait::async_trait]
pub trait RateCache: Send + Sync {
    /// Returns the cached rate if it has not expired.
    async fn get(&self) -> Option<Rate>;

    /// Stores the rate, replacing any previous value, expiring after `ttl`.
    async fn set(&self, rate: Rate, ttl: Duration);
}
