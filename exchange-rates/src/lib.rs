//! Exchange rate adapters for the delivery service.
//!
//! Implements the `RateCache` and `RateProvider` ports from `delivery-types`:
//!
//! - [`KvRateCache`] - single-key key-value store holding the last USD→RUB rate
//!   as a numeric string with an expiry
//! - [`CbrRateProvider`] - fetches the rate from the CBR daily JSON feed
//! - [`StaticRateProvider`] - fixed rate for development and testing
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use delivery_types::{Rate, RateCache, RateProvider};
//! use exchange_rates::{KvRateCache, StaticRateProvider};
//!
//! # tokio_test_block(async {
//! let provider = StaticRateProvider::new(Rate::new(90.0).unwrap());
//! let cache = KvRateCache::new();
//!
//! let rate = provider.fetch().await.unwrap();
//! cache.set(rate, Duration::from_secs(300)).await;
//! assert_eq!(cache.get().await, Some(rate));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f);
//! # }
//! ```

mod cache;
mod cbr;
mod fixed;

pub use cache::{KvRateCache, USD_RUB_KEY};
pub use cbr::{CbrRateProvider, DEFAULT_CBR_URL, DEFAULT_FETCH_TIMEOUT, parse_usd_rate};
pub use fixed::StaticRateProvider;
