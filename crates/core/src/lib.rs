//! Bookstall domain core: money, catalog items, pricing and document
//! locations.
//!
//! Everything here is pure and synchronous. Service calls live in
//! `bookstall-resolve`; this crate only decides prices, quantities and how
//! a stored document location should be fetched.

pub mod catalog;
pub mod error;
pub mod filename;
pub mod location;
pub mod money;
pub mod pricing;

pub use catalog::{CatalogItem, Sale, Selection, StockPolicy, Variation};
pub use error::{CatalogError, PricingError};
pub use filename::download_filename;
pub use location::{PlatformStorageRef, StorageLocation};
pub use money::Money;
pub use pricing::{
    change_quantity, compute_effective_price, price_breakdown, validate_and_compute_total,
    Adjustment, PriceBreakdown,
};
