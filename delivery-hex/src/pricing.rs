//! Bulk delivery price recomputation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use delivery_types::{AppError, JobOutcome, ParcelRepository, Rate};

use crate::rates::RateService;
use crate::scheduler::Job;

/// Name the price update pass is registered under.
pub const UPDATE_DELIVERY_PRICES: &str = "update_delivery_prices";

/// Result of one price update pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceUpdateReport {
    /// Rate every parcel in this pass was priced at
    pub rate: Rate,
    pub updated: usize,
    pub failed: usize,
}

impl From<PriceUpdateReport> for JobOutcome {
    fn from(report: PriceUpdateReport) -> Self {
        JobOutcome {
            succeeded: report.updated,
            failed: report.failed,
            rate: Some(report.rate.value()),
        }
    }
}

/// Prices every parcel that does not have a delivery price yet.
pub struct PriceUpdateService<R: ParcelRepository> {
    repo: Arc<R>,
    rates: Arc<RateService>,
}

impl<R: ParcelRepository> PriceUpdateService<R> {
    pub fn new(repo: Arc<R>, rates: Arc<RateService>) -> Self {
        Self { repo, rates }
    }

    /// Runs one pass.
    ///
    /// The rate is resolved before anything is read, so a rate failure
    /// leaves every parcel untouched. A parcel that fails to persist is
    /// counted in `failed` and the rest of the backlog is still processed.
    #[tracing::instrument(skip(self))]
    pub async fn update_all(&self) -> Result<PriceUpdateReport, AppError> {
        let rate = self.rates.get_current_rate().await.map_err(|e| {
            tracing::warn!("price update aborted, no rate: {}", e);
            AppError::from(e)
        })?;

        let parcels = self.repo.get_unpriced_parcels().await?;
        let now = Utc::now();

        let mut report = PriceUpdateReport {
            rate,
            updated: 0,
            failed: 0,
        };

        for mut parcel in parcels {
            let price = parcel.apply_rate(rate, now);
            match self.repo.persist(&parcel).await {
                Ok(()) => {
                    tracing::debug!(parcel_id = %parcel.id, price, "parcel priced");
                    report.updated += 1;
                }
                Err(e) => {
                    tracing::error!(parcel_id = %parcel.id, "failed to persist price: {}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            rate = rate.value(),
            updated = report.updated,
            failed = report.failed,
            "price update finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl<R: ParcelRepository> Job for PriceUpdateService<R> {
    fn name(&self) -> &str {
        UPDATE_DELIVERY_PRICES
    }

    async fn run(&self) -> Result<JobOutcome, AppError> {
        self.update_all().await.map(JobOutcome::from)
    }
}
