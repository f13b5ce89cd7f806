//! In-memory backend implementing every service trait.
//!
//! Holds entitlements, content and products in process memory behind a
//! mutex. Purchases are checked and applied atomically under the lock, so
//! the stock check here is authoritative in the same way the hosted
//! backend's is. Used by tests, the conformance suite and offline CLI runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{
    CatalogItemRecord, ContentItemRecord, EntitlementRecord, PurchaseReceipt, PurchaseSubmission,
};
use crate::traits::{CatalogBackend, EntitlementStore, ObjectSigner};

/// Base URL used for generated storage URLs.
pub const DEFAULT_BASE_URL: &str = "https://memory.invalid";

#[derive(Default)]
struct State {
    content: HashMap<String, ContentItemRecord>,
    entitlements: Vec<EntitlementRecord>,
    items: HashMap<String, CatalogItemRecord>,
    purchases: Vec<PurchaseSubmission>,
    sign_requests: Vec<SignRequest>,
    signing_fails: bool,
    next_id: u64,
}

/// A signing call observed by the in-memory signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub bucket: String,
    pub path: String,
    pub expires_in: Duration,
}

pub struct InMemoryBackend {
    base_url: String,
    state: Mutex<State>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        InMemoryBackend {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Recover data even if the mutex was poisoned by a panicking test
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_content(&self, content: ContentItemRecord) {
        self.lock().content.insert(content.id.clone(), content);
    }

    /// Insert an entitlement. The joined `content` field is ignored on
    /// insert and filled from the content table on read.
    pub fn insert_entitlement(&self, mut record: EntitlementRecord) {
        record.content = None;
        self.lock().entitlements.push(record);
    }

    pub fn insert_item(&self, item: CatalogItemRecord) {
        self.lock().items.insert(item.id.clone(), item);
    }

    /// Make every subsequent signing call fail (or succeed again).
    pub fn set_signing_fails(&self, fails: bool) {
        self.lock().signing_fails = fails;
    }

    pub fn sign_requests(&self) -> Vec<SignRequest> {
        self.lock().sign_requests.clone()
    }

    pub fn purchases(&self) -> Vec<PurchaseSubmission> {
        self.lock().purchases.clone()
    }

    pub fn item(&self, item_id: &str) -> Option<CatalogItemRecord> {
        self.lock().items.get(item_id).cloned()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryBackend {
    async fn find_active_entitlement(
        &self,
        content_id: &str,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, StoreError> {
        let state = self.lock();
        let found = state
            .entitlements
            .iter()
            .find(|e| e.content_id == content_id && e.user_id == user_id && e.grants_access())
            .cloned();
        Ok(found.map(|mut record| {
            record.content = state.content.get(content_id).cloned();
            record
        }))
    }
}

#[async_trait]
impl ObjectSigner for InMemoryBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let mut state = self.lock();
        state.sign_requests.push(SignRequest {
            bucket: bucket.to_string(),
            path: path.to_string(),
            expires_in,
        });
        if state.signing_fails {
            return Err(StoreError::Transport {
                message: "signing service unavailable".to_string(),
            });
        }
        state.next_id += 1;
        Ok(format!(
            "{}/storage/v1/object/sign/{}/{}?token=mem-{}&expires_in={}",
            self.base_url,
            bucket,
            path,
            state.next_id,
            expires_in.as_secs()
        ))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

#[async_trait]
impl CatalogBackend for InMemoryBackend {
    async fn fetch_item(&self, item_id: &str) -> Result<CatalogItemRecord, StoreError> {
        self.lock()
            .items
            .get(item_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "product".to_string(),
                id: item_id.to_string(),
            })
    }

    async fn submit_purchase(
        &self,
        submission: PurchaseSubmission,
    ) -> Result<PurchaseReceipt, StoreError> {
        let mut state = self.lock();
        let item = state
            .items
            .get_mut(&submission.product_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "product".to_string(),
                id: submission.product_id.clone(),
            })?;

        if submission.quantity == 0 {
            return Err(StoreError::Rejected {
                message: "quantity must be positive".to_string(),
            });
        }
        let quantity = i64::from(submission.quantity);
        if item.manage_stock {
            if quantity > item.stock_quantity {
                return Err(StoreError::Rejected {
                    message: format!(
                        "only {} of '{}' left in stock",
                        item.stock_quantity, item.name
                    ),
                });
            }
            item.stock_quantity -= quantity;
        }
        state.next_id += 1;
        let receipt = PurchaseReceipt {
            purchase_id: format!("purchase-{}", state.next_id),
            product_id: submission.product_id.clone(),
            quantity: submission.quantity,
            // Orders are not priced here; sale and option pricing live in
            // bookstall-core.
            total_amount: None,
            status: Some("completed".to_string()),
        };
        state.purchases.push(submission);
        Ok(receipt)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
