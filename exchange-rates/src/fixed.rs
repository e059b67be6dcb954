//! Fixed-rate provider for development and testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use delivery_types::{Rate, RateError, RateProvider};

/// Always answers with the same rate. Counts how often it was asked.
pub struct StaticRateProvider {
    rate: Rate,
    fetches: AtomicUsize,
}

impl StaticRateProvider {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn fetch(&self) -> Result<Rate, RateError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.rate)
    }
}
