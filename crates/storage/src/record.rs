use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment state of a purchase as recorded by the external payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// A readable document as stored by the hosted service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItemRecord {
    pub id: String,
    pub title: String,
    /// Direct URL or opaque `bucket/path` storage reference. `None` or blank
    /// when the document was never uploaded.
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub business_id: Option<String>,
}

/// Proof that a user bought a content item, joined with the item itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub user_id: String,
    #[serde(rename = "book_id")]
    pub content_id: String,
    pub payment_status: PaymentStatus,
    pub access_granted: bool,
    /// ISO 8601 / RFC 3339 timestamp string.
    #[serde(default)]
    pub purchased_at: Option<String>,
    #[serde(default)]
    pub content: Option<ContentItemRecord>,
}

impl EntitlementRecord {
    /// Access requires a completed payment AND an explicit grant.
    pub fn grants_access(&self) -> bool {
        self.payment_status == PaymentStatus::Completed && self.access_granted
    }
}

/// One option axis of a product, as stored in the product's `variations`
/// JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationRecord {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Option label → signed price delta.
    #[serde(default)]
    pub price_modifiers: BTreeMap<String, Decimal>,
}

/// A sellable product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemRecord {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    /// `YYYY-MM-DD` or RFC 3339 timestamp string.
    #[serde(default)]
    pub sale_start_date: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339 timestamp string.
    #[serde(default)]
    pub sale_end_date: Option<String>,
    #[serde(default)]
    pub variations: Vec<VariationRecord>,
    #[serde(default)]
    pub manage_stock: bool,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub business_id: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Body of a purchase submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseSubmission {
    pub product_id: String,
    pub quantity: u32,
    /// Variation name → chosen option label.
    #[serde(default)]
    pub selection: BTreeMap<String, String>,
}

/// The backend's acknowledgement of an accepted purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase_id: String,
    pub product_id: String,
    pub quantity: u32,
    /// Total as charged by the backend, when it reports one.
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}
