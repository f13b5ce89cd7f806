//! Purchase attempts for one product screen.
//!
//! A [`PurchaseSurface`] owns the transient state a product screen edits:
//! quantity, variation selection and the attempt state. Attempts move
//! `Idle → Validating → Submitting → {Succeeded, Failed}`; validation
//! failures skip submission. One attempt may be in flight per surface and
//! a second is rejected, never queued.
//!
//! Stock checks here are optimistic. The backend re-checks on submission
//! and its answer wins.

use std::sync::{Arc, Mutex, MutexGuard};

use bookstall_core::{
    change_quantity, compute_effective_price, validate_and_compute_total, CatalogError,
    CatalogItem, Money, PricingError, Selection,
};
use bookstall_storage::{CatalogBackend, PurchaseReceipt, PurchaseSubmission, StoreError};
use time::OffsetDateTime;

use crate::surface::{InFlightGate, Liveness};

/// Where the surface's latest attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurchaseState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl PurchaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseState::Idle => "idle",
            PurchaseState::Validating => "validating",
            PurchaseState::Submitting => "submitting",
            PurchaseState::Succeeded => "succeeded",
            PurchaseState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseError {
    /// Another attempt from this surface has not finished.
    #[error("a purchase is already in progress")]
    AlreadyInFlight,

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The backend refused the purchase.
    #[error("purchase rejected: {message}")]
    Rejected { message: String },

    #[error(transparent)]
    Backend(StoreError),
}

impl From<StoreError> for PurchaseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected { message } => PurchaseError::Rejected { message },
            other => PurchaseError::Backend(other),
        }
    }
}

impl PurchaseError {
    pub fn user_message(&self) -> String {
        match self {
            PurchaseError::AlreadyInFlight => {
                "Your purchase is already being processed.".to_string()
            }
            PurchaseError::Pricing(e) => e.user_message(),
            PurchaseError::Catalog(_) => {
                "This product is misconfigured. Please contact the seller.".to_string()
            }
            PurchaseError::Rejected { message } => format!("The purchase was declined: {message}"),
            PurchaseError::Backend(StoreError::NotFound { .. }) => {
                "This product is no longer available.".to_string()
            }
            PurchaseError::Backend(_) => {
                "Could not complete the purchase. Please try again.".to_string()
            }
        }
    }
}

/// How a submitted attempt ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Completed {
        receipt: PurchaseReceipt,
        total: Money,
    },
    /// The surface was closed while the attempt ran; nothing was applied.
    Discarded,
}

#[derive(Debug)]
struct Draft {
    quantity: u32,
    selection: Selection,
    state: PurchaseState,
}

#[derive(Debug)]
struct Inner {
    item: CatalogItem,
    draft: Mutex<Draft>,
    gate: InFlightGate,
    liveness: Liveness,
}

/// Handle to one product screen's purchase state. Clones share it.
#[derive(Debug, Clone)]
pub struct PurchaseSurface {
    inner: Arc<Inner>,
}

impl PurchaseSurface {
    /// A surface for `item` with quantity 1 and every variation on its
    /// first option.
    pub fn new(item: CatalogItem) -> Self {
        let selection = Selection::defaults_for(&item);
        PurchaseSurface {
            inner: Arc::new(Inner {
                item,
                draft: Mutex::new(Draft {
                    quantity: 1,
                    selection,
                    state: PurchaseState::Idle,
                }),
                gate: InFlightGate::new(),
                liveness: Liveness::new(),
            }),
        }
    }

    /// Fetch `item_id` from the backend and open a surface on it.
    pub async fn load<B>(backend: &B, item_id: &str) -> Result<Self, PurchaseError>
    where
        B: CatalogBackend + ?Sized,
    {
        let record = backend.fetch_item(item_id).await?;
        let item = CatalogItem::from_record(&record)?;
        tracing::debug!(item_id, variations = item.variations.len(), "catalog item loaded");
        Ok(PurchaseSurface::new(item))
    }

    pub fn item(&self) -> &CatalogItem {
        &self.inner.item
    }

    pub fn quantity(&self) -> u32 {
        self.draft().quantity
    }

    pub fn selection(&self) -> Selection {
        self.draft().selection.clone()
    }

    pub fn state(&self) -> PurchaseState {
        self.draft().state
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.gate.is_busy()
    }

    /// Step the quantity by `delta`. On error the quantity is unchanged.
    pub fn change_quantity(&self, delta: i64) -> Result<u32, PricingError> {
        let mut draft = self.draft();
        let next = change_quantity(draft.quantity, delta, &self.inner.item)?;
        draft.quantity = next;
        Ok(next)
    }

    /// Choose `option` for `variation`. On error the selection is unchanged.
    pub fn select_option(&self, variation: &str, option: &str) -> Result<(), PricingError> {
        self.draft()
            .selection
            .select(&self.inner.item, variation, option)
    }

    /// Unit price for the current selection.
    pub fn unit_price(&self, as_of: OffsetDateTime) -> Result<Money, PricingError> {
        let selection = self.selection();
        compute_effective_price(&self.inner.item, &selection, as_of)
    }

    /// Order total for the current quantity and selection.
    pub fn total(&self, as_of: OffsetDateTime) -> Result<Money, PricingError> {
        let (quantity, selection) = {
            let draft = self.draft();
            (draft.quantity, draft.selection.clone())
        };
        quote(&self.inner.item, quantity, &selection, as_of)
    }

    /// Run one purchase attempt.
    ///
    /// Quantity and selection are never modified by an attempt. A closed
    /// surface submits nothing. If the surface is closed before the backend
    /// answers, the answer is dropped. Both return `Discarded`.
    pub async fn submit<B>(
        &self,
        backend: &B,
        as_of: OffsetDateTime,
    ) -> Result<PurchaseOutcome, PurchaseError>
    where
        B: CatalogBackend + ?Sized,
    {
        if !self.inner.liveness.is_live() {
            return Ok(PurchaseOutcome::Discarded);
        }
        let Some(_guard) = self.inner.gate.try_enter() else {
            return Err(PurchaseError::AlreadyInFlight);
        };

        let (submission, total) = {
            let mut draft = self.draft();
            draft.state = PurchaseState::Validating;
            match quote(&self.inner.item, draft.quantity, &draft.selection, as_of) {
                Ok(total) => {
                    draft.state = PurchaseState::Submitting;
                    let submission = PurchaseSubmission {
                        product_id: self.inner.item.id.clone(),
                        quantity: draft.quantity,
                        selection: draft.selection.as_map().clone(),
                    };
                    (submission, total)
                }
                Err(e) => {
                    draft.state = PurchaseState::Failed;
                    tracing::debug!(
                        item_id = %self.inner.item.id,
                        error = %e,
                        "purchase failed validation"
                    );
                    return Err(e.into());
                }
            }
        };

        tracing::debug!(
            item_id = %submission.product_id,
            quantity = submission.quantity,
            total = %total,
            "submitting purchase"
        );
        let result = backend.submit_purchase(submission).await;

        if !self.inner.liveness.is_live() {
            tracing::debug!(
                item_id = %self.inner.item.id,
                "surface closed; discarding purchase result"
            );
            return Ok(PurchaseOutcome::Discarded);
        }

        let mut draft = self.draft();
        match result {
            Ok(receipt) => {
                draft.state = PurchaseState::Succeeded;
                tracing::info!(
                    item_id = %receipt.product_id,
                    purchase_id = %receipt.purchase_id,
                    quantity = receipt.quantity,
                    "purchase completed"
                );
                Ok(PurchaseOutcome::Completed { receipt, total })
            }
            Err(e) => {
                draft.state = PurchaseState::Failed;
                tracing::info!(item_id = %self.inner.item.id, error = %e, "purchase failed");
                Err(e.into())
            }
        }
    }

    /// Tear the surface down. In-flight results will be discarded.
    pub fn close(&self) {
        self.inner.liveness.close();
    }

    pub fn is_live(&self) -> bool {
        self.inner.liveness.is_live()
    }

    fn draft(&self) -> MutexGuard<'_, Draft> {
        self.inner.draft.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn quote(
    item: &CatalogItem,
    quantity: u32,
    selection: &Selection,
    as_of: OffsetDateTime,
) -> Result<Money, PricingError> {
    let unit = compute_effective_price(item, selection, as_of)?;
    validate_and_compute_total(item, i64::from(quantity), &unit)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bookstall_storage::{CatalogItemRecord, InMemoryBackend, VariationRecord};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;
    use tokio::sync::Notify;

    const AS_OF: OffsetDateTime = datetime!(2025-06-15 12:00 UTC);

    fn shirt_record(stock: Option<i64>) -> CatalogItemRecord {
        let modifiers: BTreeMap<String, Decimal> = [("S", 0), ("M", 5), ("L", 10)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Decimal::from(v)))
            .collect();
        CatalogItemRecord {
            id: "shirt".to_string(),
            name: "Shirt".to_string(),
            price: Decimal::from(100),
            currency: "USD".to_string(),
            sale_price: Some(Decimal::from(80)),
            sale_start_date: None,
            sale_end_date: None,
            variations: vec![VariationRecord {
                name: "Size".to_string(),
                options: vec!["S".to_string(), "M".to_string(), "L".to_string()],
                price_modifiers: modifiers,
            }],
            manage_stock: stock.is_some(),
            stock_quantity: stock.unwrap_or(0),
            low_stock_threshold: 0,
            business_id: None,
        }
    }

    async fn loaded(stock: Option<i64>) -> (InMemoryBackend, PurchaseSurface) {
        let backend = InMemoryBackend::new();
        backend.insert_item(shirt_record(stock));
        let surface = PurchaseSurface::load(&backend, "shirt").await.unwrap();
        (backend, surface)
    }

    #[tokio::test]
    async fn load_defaults_to_first_option_and_quantity_one() {
        let (_, surface) = loaded(None).await;
        assert_eq!(surface.quantity(), 1);
        assert_eq!(surface.selection().get("Size"), Some("S"));
        assert_eq!(surface.state(), PurchaseState::Idle);
        assert_eq!(surface.unit_price(AS_OF).unwrap().amount, Decimal::from(80));
    }

    #[tokio::test]
    async fn load_of_unknown_item_is_backend_not_found() {
        let backend = InMemoryBackend::new();
        let err = PurchaseSurface::load(&backend, "nope").await.unwrap_err();
        assert!(matches!(err, PurchaseError::Backend(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn quantity_and_selection_change_only_on_success() {
        let (_, surface) = loaded(Some(2)).await;
        assert_eq!(surface.change_quantity(1), Ok(2));
        assert!(surface.change_quantity(1).is_err());
        assert_eq!(surface.quantity(), 2);
        assert_eq!(surface.change_quantity(-5), Ok(1));

        surface.select_option("Size", "L").unwrap();
        assert!(surface.select_option("Size", "XXL").is_err());
        assert_eq!(surface.selection().get("Size"), Some("L"));
        assert_eq!(surface.total(AS_OF).unwrap().amount, Decimal::from(90));
    }

    #[tokio::test]
    async fn successful_submit_sends_quantity_and_selection() {
        let (backend, surface) = loaded(Some(5)).await;
        surface.change_quantity(1).unwrap();
        surface.select_option("Size", "M").unwrap();

        let outcome = surface.submit(&backend, AS_OF).await.unwrap();
        match outcome {
            PurchaseOutcome::Completed { receipt, total } => {
                assert_eq!(receipt.quantity, 2);
                assert_eq!(total.amount, Decimal::from(170));
            }
            PurchaseOutcome::Discarded => panic!("surface was live"),
        }
        assert_eq!(surface.state(), PurchaseState::Succeeded);

        let sent = backend.purchases();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].selection.get("Size").map(String::as_str), Some("M"));
    }

    #[tokio::test]
    async fn backend_rejection_keeps_quantity_and_selection() {
        let (backend, surface) = loaded(Some(3)).await;
        surface.change_quantity(2).unwrap();
        surface.select_option("Size", "L").unwrap();

        // Another buyer takes stock after the item was loaded.
        backend.insert_item(shirt_record(Some(1)));

        let err = surface.submit(&backend, AS_OF).await.unwrap_err();
        assert!(matches!(err, PurchaseError::Rejected { .. }));
        assert_eq!(surface.state(), PurchaseState::Failed);
        assert_eq!(surface.quantity(), 3);
        assert_eq!(surface.selection().get("Size"), Some("L"));
    }

    /// Backend that parks `submit_purchase` until released.
    struct Parked {
        inner: InMemoryBackend,
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogBackend for Parked {
        async fn fetch_item(&self, item_id: &str) -> Result<CatalogItemRecord, StoreError> {
            self.inner.fetch_item(item_id).await
        }

        async fn submit_purchase(
            &self,
            submission: PurchaseSubmission,
        ) -> Result<PurchaseReceipt, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.submit_purchase(submission).await
        }
    }

    fn parked() -> Arc<Parked> {
        let inner = InMemoryBackend::new();
        inner.insert_item(shirt_record(None));
        Arc::new(Parked {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_rejected() {
        let backend = parked();
        let surface = PurchaseSurface::load(backend.as_ref(), "shirt").await.unwrap();

        let first = {
            let (backend, surface) = (backend.clone(), surface.clone());
            tokio::spawn(async move { surface.submit(backend.as_ref(), AS_OF).await })
        };
        backend.entered.notified().await;
        assert!(surface.is_submitting());

        let second = surface.submit(backend.as_ref(), AS_OF).await;
        assert_eq!(second, Err(PurchaseError::AlreadyInFlight));

        backend.release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, PurchaseOutcome::Completed { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!surface.is_submitting());
    }

    #[tokio::test]
    async fn result_after_close_is_discarded() {
        let backend = parked();
        let surface = PurchaseSurface::load(backend.as_ref(), "shirt").await.unwrap();

        let attempt = {
            let (backend, surface) = (backend.clone(), surface.clone());
            tokio::spawn(async move { surface.submit(backend.as_ref(), AS_OF).await })
        };
        backend.entered.notified().await;
        surface.close();
        backend.release.notify_one();

        assert_eq!(attempt.await.unwrap(), Ok(PurchaseOutcome::Discarded));
        assert_eq!(surface.state(), PurchaseState::Submitting);
    }

    #[tokio::test]
    async fn closed_surface_submits_nothing() {
        let (backend, surface) = loaded(Some(5)).await;
        surface.close();

        let outcome = surface.submit(&backend, AS_OF).await;
        assert_eq!(outcome, Ok(PurchaseOutcome::Discarded));
        assert!(backend.purchases().is_empty());
        assert_eq!(surface.state(), PurchaseState::Idle);
        assert_eq!(backend.item("shirt").unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_backend() {
        let (backend, surface) = loaded(Some(0)).await;
        let err = surface.submit(&backend, AS_OF).await.unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::Pricing(PricingError::InsufficientStock { .. })
        ));
        assert_eq!(surface.state(), PurchaseState::Failed);
        assert!(backend.purchases().is_empty());
    }
}
