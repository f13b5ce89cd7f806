use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{CatalogItemRecord, EntitlementRecord, PurchaseReceipt, PurchaseSubmission};

/// Read access to purchase entitlements.
///
/// ## Query Semantics
///
/// `find_active_entitlement` is a point query on
/// `(content_id, user_id, payment_status = completed, access_granted = true)`.
/// Implementations MUST NOT return records that fail either condition; a
/// pending, failed, refunded or revoked purchase is reported as `Ok(None)`
/// exactly like a purchase that never happened.
///
/// The returned record carries the joined `content` row so callers get the
/// document location in the same round trip.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Find the unique active entitlement for a user and content item.
    async fn find_active_entitlement(
        &self,
        content_id: &str,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, StoreError>;
}

/// Issues time-limited URLs for objects in the hosted object storage.
///
/// `path` arguments are decoded object keys; implementations encode them
/// when building URLs.
#[async_trait]
pub trait ObjectSigner: Send + Sync {
    /// Base URL of the storage this signer serves. Storage URLs on any
    /// other origin are not this signer's objects.
    fn base_url(&self) -> &str;

    /// Create a signed URL for `bucket/path` valid for `expires_in`.
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError>;

    /// The unsigned public URL of `bucket/path`.
    ///
    /// Used when an opaque storage reference must be handed out and signing
    /// was not possible.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Catalog lookup and purchase submission.
///
/// The backend performs its own authoritative stock and entitlement checks
/// on `submit_purchase`; any local pre-check is optimistic only.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Fetch a catalog item by identifier.
    ///
    /// Returns `Err(StoreError::NotFound)` if the item does not exist.
    async fn fetch_item(&self, item_id: &str) -> Result<CatalogItemRecord, StoreError>;

    /// Submit a purchase. Never retried by callers.
    ///
    /// Returns `Err(StoreError::Rejected)` when the backend refuses it
    /// (e.g. stock exhausted since the item was fetched).
    async fn submit_purchase(
        &self,
        submission: PurchaseSubmission,
    ) -> Result<PurchaseReceipt, StoreError>;
}
