//! Bookstall flows over the storage traits.
//!
//! - [`access`]: decide whether a user may read a content item and produce
//!   the URL to fetch
//! - [`delivery`]: hand that URL to a viewer, falling back from the
//!   embedded viewer to the browser to a manual download
//! - [`purchase`]: the per-screen purchase state machine
//! - [`reader`]: the per-screen open/download flows
//! - `adapter` (feature `adapter`): the hosted-service client and the
//!   file downloader

pub mod access;
pub mod delivery;
pub mod download;
pub mod purchase;
pub mod reader;
pub mod surface;

#[cfg(feature = "adapter")]
pub mod adapter;

pub use access::{resolve_accessible_content, AccessError, RetrievalDescriptor, SIGNED_URL_TTL};
pub use delivery::{
    classify_viewer_error, deliver_content, ContentPresenter, DeliveryChannel, DeliveryError,
    DeliveryOutcome, ViewerDisposition, ViewerError,
};
pub use download::{DownloadError, Downloader};
pub use purchase::{PurchaseError, PurchaseOutcome, PurchaseState, PurchaseSurface};
pub use reader::{Downloaded, Opened, ReaderError, ReaderOutcome, ReaderSurface};
pub use surface::{InFlightGate, InFlightGuard, Liveness};
