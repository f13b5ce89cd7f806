//! The reading screen: open or download one content item for one user.
//!
//! Each flow re-resolves access (so a refund since the last open is
//! noticed), then hands the URL to the presenter or the downloader. Open
//! and download are gated independently, and results arriving after the
//! screen closed are discarded.

use std::path::PathBuf;

use bookstall_core::download_filename;
use bookstall_storage::{EntitlementStore, ObjectSigner};

use crate::access::{resolve_accessible_content, AccessError, RetrievalDescriptor};
use crate::delivery::{deliver_content, ContentPresenter, DeliveryError, DeliveryOutcome};
use crate::download::{DownloadError, Downloader};
use crate::surface::{InFlightGate, Liveness};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("this action is already in progress")]
    AlreadyInFlight,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl ReaderError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ReaderError::AlreadyInFlight => "Please wait, this is already in progress.",
            ReaderError::Access(e) => e.user_message(),
            ReaderError::Delivery(e) => e.user_message(),
            ReaderError::Download(e) => e.user_message(),
        }
    }
}

/// Result of a reader flow that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderOutcome<T> {
    Ready(T),
    /// The screen closed before the flow finished.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub descriptor: RetrievalDescriptor,
    pub delivery: DeliveryOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub descriptor: RetrievalDescriptor,
    pub filename: String,
    pub path: PathBuf,
}

/// One open reading screen.
#[derive(Debug, Clone)]
pub struct ReaderSurface {
    content_id: String,
    user_id: String,
    opening: InFlightGate,
    downloading: InFlightGate,
    liveness: Liveness,
}

impl ReaderSurface {
    pub fn new(content_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        ReaderSurface {
            content_id: content_id.into(),
            user_id: user_id.into(),
            opening: InFlightGate::new(),
            downloading: InFlightGate::new(),
            liveness: Liveness::new(),
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Resolve access and present the document.
    pub async fn open<S, G, P>(
        &self,
        store: &S,
        signer: &G,
        presenter: &P,
    ) -> Result<ReaderOutcome<Opened>, ReaderError>
    where
        S: EntitlementStore + ?Sized,
        G: ObjectSigner + ?Sized,
        P: ContentPresenter + ?Sized,
    {
        if !self.liveness.is_live() {
            return Ok(ReaderOutcome::Discarded);
        }
        let Some(_guard) = self.opening.try_enter() else {
            return Err(ReaderError::AlreadyInFlight);
        };

        let resolved =
            resolve_accessible_content(store, signer, &self.content_id, &self.user_id).await;
        if !self.liveness.is_live() {
            return Ok(ReaderOutcome::Discarded);
        }
        let descriptor = resolved?;

        let filename = download_filename(&descriptor.title, Some(&descriptor.url));
        let delivered = deliver_content(presenter, &descriptor.url, &filename).await;
        if !self.liveness.is_live() {
            return Ok(ReaderOutcome::Discarded);
        }
        let delivery = delivered?;
        tracing::debug!(
            content_id = %self.content_id,
            channel = %delivery.channel,
            signed = descriptor.signed,
            "content presented"
        );
        Ok(ReaderOutcome::Ready(Opened {
            descriptor,
            delivery,
        }))
    }

    /// Resolve access and save the document locally.
    pub async fn download<S, G, D>(
        &self,
        store: &S,
        signer: &G,
        downloader: &D,
    ) -> Result<ReaderOutcome<Downloaded>, ReaderError>
    where
        S: EntitlementStore + ?Sized,
        G: ObjectSigner + ?Sized,
        D: Downloader + ?Sized,
    {
        if !self.liveness.is_live() {
            return Ok(ReaderOutcome::Discarded);
        }
        let Some(_guard) = self.downloading.try_enter() else {
            return Err(ReaderError::AlreadyInFlight);
        };

        let resolved =
            resolve_accessible_content(store, signer, &self.content_id, &self.user_id).await;
        if !self.liveness.is_live() {
            return Ok(ReaderOutcome::Discarded);
        }
        let descriptor = resolved?;

        let filename = download_filename(&descriptor.title, Some(&descriptor.url));
        let saved = downloader.download(&descriptor.url, &filename).await;
        if !self.liveness.is_live() {
            return Ok(ReaderOutcome::Discarded);
        }
        let path = saved?;
        tracing::debug!(
            content_id = %self.content_id,
            path = %path.display(),
            "content downloaded"
        );
        Ok(ReaderOutcome::Ready(Downloaded {
            descriptor,
            filename,
            path,
        }))
    }

    pub fn close(&self) {
        self.liveness.close();
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
