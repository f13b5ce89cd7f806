//! Conformance test suite for hosted-backend implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! implementation of [`EntitlementStore`], [`ObjectSigner`] and
//! [`CatalogBackend`] can run to verify it honours the trait contracts.
//! The suite covers:
//!
//! - **Entitlements**: only completed + granted purchases are visible, the
//!   joined content row is present
//! - **Signing**: signed URLs are produced for seeded objects, public URLs
//!   name the bucket and path
//! - **Catalog**: item lookup, missing items, stock enforcement on purchase
//! - **Concurrency**: racing purchases never oversell managed stock
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds
//! a fresh backend seeded with the given [`ConformanceFixture`]:
//!
//! ```ignore
//! use bookstall_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn staging_conformance() {
//!     let report = run_conformance_suite(|fixture| async move {
//!         seed_staging_project(fixture).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod catalog;
mod concurrent;
mod entitlement;
mod signer;

use std::fmt;
use std::future::Future;

use rust_decimal::Decimal;

use crate::record::{
    CatalogItemRecord, ContentItemRecord, EntitlementRecord, PaymentStatus, VariationRecord,
};
use crate::{CatalogBackend, EntitlementStore, ObjectSigner};

/// Every trait a full backend implements.
pub trait Backend: EntitlementStore + ObjectSigner + CatalogBackend + 'static {}

impl<T> Backend for T where T: EntitlementStore + ObjectSigner + CatalogBackend + 'static {}

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "entitlement", "catalog").
    pub category: String,
    /// Test name (e.g. "pending_purchase_is_invisible").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// The rows a backend must contain before each conformance test.
#[derive(Debug, Clone)]
pub struct ConformanceFixture {
    pub content: Vec<ContentItemRecord>,
    pub entitlements: Vec<EntitlementRecord>,
    pub items: Vec<CatalogItemRecord>,
}

/// User with a completed, granted purchase of `BOOK`.
pub const BUYER: &str = "buyer";
/// User whose purchase of `BOOK` is still pending.
pub const PENDING_BUYER: &str = "pending-buyer";
/// User whose purchase of `BOOK` was refunded.
pub const REFUNDED_BUYER: &str = "refunded-buyer";
/// User who paid but whose access was revoked.
pub const REVOKED_BUYER: &str = "revoked-buyer";
pub const BOOK: &str = "book-1";
pub const BOOK_BUCKET: &str = "books";
pub const BOOK_PATH: &str = "book-1.pdf";
/// Managed stock, 3 units.
pub const LIMITED_ITEM: &str = "limited";
/// Unmanaged stock with a zero quantity on record.
pub const UNLIMITED_ITEM: &str = "unlimited";
pub const LIMITED_STOCK: i64 = 3;

impl ConformanceFixture {
    /// The standard fixture every test runs against.
    pub fn standard() -> Self {
        let content = vec![ContentItemRecord {
            id: BOOK.to_string(),
            title: "Bookkeeping for Small Shops".to_string(),
            file_url: Some(format!("{BOOK_BUCKET}/{BOOK_PATH}")),
            business_id: Some("biz-1".to_string()),
        }];

        let purchase = |user: &str, status: PaymentStatus, granted: bool| EntitlementRecord {
            user_id: user.to_string(),
            content_id: BOOK.to_string(),
            payment_status: status,
            access_granted: granted,
            purchased_at: Some("2025-01-01T00:00:00Z".to_string()),
            content: None,
        };
        let entitlements = vec![
            purchase(BUYER, PaymentStatus::Completed, true),
            purchase(PENDING_BUYER, PaymentStatus::Pending, true),
            purchase(REFUNDED_BUYER, PaymentStatus::Refunded, true),
            purchase(REVOKED_BUYER, PaymentStatus::Completed, false),
        ];

        let item = |id: &str, manage_stock: bool, stock: i64| CatalogItemRecord {
            id: id.to_string(),
            name: format!("Item {id}"),
            price: Decimal::from(100),
            currency: "USD".to_string(),
            sale_price: None,
            sale_start_date: None,
            sale_end_date: None,
            variations: vec![VariationRecord {
                name: "Size".to_string(),
                options: vec!["S".to_string(), "M".to_string(), "L".to_string()],
                price_modifiers: [
                    ("M".to_string(), Decimal::from(5)),
                    ("L".to_string(), Decimal::from(10)),
                ]
                .into_iter()
                .collect(),
            }],
            manage_stock,
            stock_quantity: stock,
            low_stock_threshold: 1,
            business_id: Some("biz-1".to_string()),
        };
        let items = vec![
            item(LIMITED_ITEM, true, LIMITED_STOCK),
            item(UNLIMITED_ITEM, false, 0),
        ];

        ConformanceFixture {
            content,
            entitlements,
            items,
        }
    }
}

/// Run the full conformance suite against a backend.
///
/// The `factory` function is called once per test with the standard
/// fixture and must return a fresh backend containing exactly those rows,
/// ensuring test isolation.
pub async fn run_conformance_suite<B, F, Fut>(factory: F) -> ConformanceReport
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let mut results = Vec::new();

    results.extend(entitlement::run_entitlement_tests(&factory).await);
    results.extend(signer::run_signer_tests(&factory).await);
    results.extend(catalog::run_catalog_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

/// Build a fresh backend from the standard fixture.
async fn fresh<B, F, Fut>(factory: &F) -> B
where
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    factory(ConformanceFixture::standard()).await
}
