pub mod conformance;
mod error;
pub mod memory;
mod record;
mod traits;

pub use error::StoreError;
pub use memory::InMemoryBackend;
pub use record::{
    CatalogItemRecord, ContentItemRecord, EntitlementRecord, PaymentStatus, PurchaseReceipt,
    PurchaseSubmission, VariationRecord,
};
pub use traits::{CatalogBackend, EntitlementStore, ObjectSigner};
