//! Handing a resolved URL to a viewer, with fallbacks.
//!
//! The embedded viewer is tried first. Viewer-reported errors are
//! classified:
//! - HTTP 403 / 404 → the user lost access (or the object is gone); stop
//!   and surface an access-denied message
//! - anything else (navigation, network, other statuses) → try the next
//!   channel: external browser, then manual download
//!
//! If every channel fails the last transport error is surfaced.

use std::fmt;

use async_trait::async_trait;

/// An error reported by a viewer channel while fetching the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("navigation failed: {message}")]
    Navigation { message: String },
}

/// What to do about a [`ViewerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerDisposition {
    /// Treat as access denied; do not try other channels.
    Denied,
    /// Recoverable; try the next channel.
    Fallback,
}

pub fn classify_viewer_error(err: &ViewerError) -> ViewerDisposition {
    match err {
        ViewerError::Http { status: 403 | 404 } => ViewerDisposition::Denied,
        ViewerError::Http { .. } | ViewerError::Navigation { .. } => ViewerDisposition::Fallback,
    }
}

/// The ways a document can reach the user, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryChannel {
    Embedded,
    ExternalBrowser,
    ManualDownload,
}

impl DeliveryChannel {
    pub const ORDER: [DeliveryChannel; 3] = [
        DeliveryChannel::Embedded,
        DeliveryChannel::ExternalBrowser,
        DeliveryChannel::ManualDownload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Embedded => "embedded",
            DeliveryChannel::ExternalBrowser => "external_browser",
            DeliveryChannel::ManualDownload => "manual_download",
        }
    }
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The UI collaborator that actually shows or saves content.
#[async_trait]
pub trait ContentPresenter: Send + Sync {
    async fn show_embedded(&self, url: &str) -> Result<(), ViewerError>;

    async fn open_external(&self, url: &str) -> Result<(), ViewerError>;

    /// Offer the document as a download named `filename`.
    async fn offer_download(&self, url: &str, filename: &str) -> Result<(), ViewerError>;
}

/// Which channel worked and what failed before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub channel: DeliveryChannel,
    pub failed_attempts: Vec<(DeliveryChannel, ViewerError)>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// A viewer got 403/404 for the resolved URL.
    #[error("access denied by {channel} ({source})")]
    AccessDenied {
        channel: DeliveryChannel,
        source: ViewerError,
    },

    /// Every channel failed.
    #[error("could not open the document: {last}")]
    Transport {
        attempts: Vec<(DeliveryChannel, ViewerError)>,
        last: ViewerError,
    },
}

impl DeliveryError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DeliveryError::AccessDenied { .. } => {
                "You don't have access to this book. It may have been refunded or removed."
            }
            DeliveryError::Transport { .. } => {
                "We couldn't open this book. Check your connection and try again."
            }
        }
    }
}

/// Present `url`, falling back through [`DeliveryChannel::ORDER`].
pub async fn deliver_content<P>(
    presenter: &P,
    url: &str,
    filename: &str,
) -> Result<DeliveryOutcome, DeliveryError>
where
    P: ContentPresenter + ?Sized,
{
    let mut failed_attempts = Vec::new();
    for channel in DeliveryChannel::ORDER {
        let result = match channel {
            DeliveryChannel::Embedded => presenter.show_embedded(url).await,
            DeliveryChannel::ExternalBrowser => presenter.open_external(url).await,
            DeliveryChannel::ManualDownload => presenter.offer_download(url, filename).await,
        };
        let err = match result {
            Ok(()) => {
                return Ok(DeliveryOutcome {
                    channel,
                    failed_attempts,
                })
            }
            Err(err) => err,
        };
        match classify_viewer_error(&err) {
            ViewerDisposition::Denied => {
                return Err(DeliveryError::AccessDenied {
                    channel,
                    source: err,
                })
            }
            ViewerDisposition::Fallback => {
                tracing::debug!(%channel, error = %err, "viewer channel failed; falling back");
                failed_attempts.push((channel, err));
            }
        }
    }

    match failed_attempts.last() {
        Some((_, last)) => {
            let last = last.clone();
            Err(DeliveryError::Transport {
                attempts: failed_attempts,
                last,
            })
        }
        // ORDER is non-empty, so at least one attempt was recorded.
        None => Err(DeliveryError::Transport {
            attempts: Vec::new(),
            last: ViewerError::Navigation {
                message: "no delivery channel available".to_string(),
            },
        }),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
