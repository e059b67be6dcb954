//! # Delivery Hex
//!
//! Application service layer and HTTP adapter for the parcel delivery service.
//!
//! ## Architecture
//!
//! - `service` - Parcel and company operations (orchestrates domain operations)
//! - `rates` - Cache-through exchange rate lookup
//! - `pricing` - Bulk delivery price recomputation
//! - `scheduler` - Named jobs run on demand or on a fixed interval
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The services are generic over the repository ports, allowing
//! different repository implementations to be injected.

pub mod inbound;
pub mod openapi;
pub mod pricing;
pub mod rates;
pub mod scheduler;
pub mod service;


pub use pricing::{PriceUpdateReport, PriceUpdateService, UPDATE_DELIVERY_PRICES};
pub use rates::{DEFAULT_RATE_TTL, RateService};
pub use scheduler::{Job, Scheduler};
pub use service::DeliveryService;
