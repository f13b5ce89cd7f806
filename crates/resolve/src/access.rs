//! Entitlement-gated content resolution.
//!
//! Given a user and a content item, decide whether the user may read it and
//! produce the URL the viewer should fetch. Pipeline:
//! 1. Point query for a completed + granted entitlement (joined content row)
//! 2. No entitlement → `AccessDenied`; no document → `ContentUnavailable`
//! 3. Platform-storage locations get a one-hour signed URL; if signing
//!    fails the unsigned location is used instead
//! 4. Other locations pass through unchanged
//!
//! One read, at most one signing call, no writes.

use std::time::Duration;

use bookstall_core::{PlatformStorageRef, StorageLocation};
use bookstall_storage::{EntitlementStore, ObjectSigner, StoreError};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Validity of signed retrieval URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Why content could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// A required identifier was empty.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The user holds no active entitlement. Never purchased, pending,
    /// failed, refunded and revoked all land here.
    #[error("access denied")]
    AccessDenied,

    /// The user may read the item but it has no document.
    #[error("content {content_id} has no document")]
    ContentUnavailable { content_id: String },

    /// The entitlement store could not be queried.
    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl AccessError {
    /// The message shown to the user. Each kind maps to a distinct action.
    pub fn user_message(&self) -> &'static str {
        match self {
            AccessError::InvalidRequest { .. } => "Something went wrong opening this book.",
            AccessError::AccessDenied => {
                "You don't have access to this book yet. Purchase it to start reading."
            }
            AccessError::ContentUnavailable { .. } => {
                "This book's file is not available. Please contact support."
            }
            AccessError::Backend(_) => "Could not check your access. Please try again.",
        }
    }
}

/// The URL to hand to the viewer, plus what is known about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalDescriptor {
    pub content_id: String,
    pub title: String,
    pub url: String,
    /// Whether `url` is a freshly signed, time-limited URL.
    pub signed: bool,
    pub expires_at: Option<OffsetDateTime>,
}

impl RetrievalDescriptor {
    pub fn to_json(&self) -> serde_json::Value {
        let expires_at = self
            .expires_at
            .and_then(|t| t.format(&Rfc3339).ok());
        serde_json::json!({
            "content_id": self.content_id,
            "title": self.title,
            "url": self.url,
            "signed": self.signed,
            "expires_at": expires_at,
        })
    }
}

/// Resolve the retrieval URL for `content_id` on behalf of `user_id`.
pub async fn resolve_accessible_content<S, G>(
    store: &S,
    signer: &G,
    content_id: &str,
    user_id: &str,
) -> Result<RetrievalDescriptor, AccessError>
where
    S: EntitlementStore + ?Sized,
    G: ObjectSigner + ?Sized,
{
    if content_id.trim().is_empty() {
        return Err(AccessError::InvalidRequest {
            message: "content id is empty".to_string(),
        });
    }
    if user_id.trim().is_empty() {
        return Err(AccessError::InvalidRequest {
            message: "user id is empty".to_string(),
        });
    }

    let entitlement = store
        .find_active_entitlement(content_id, user_id)
        .await?
        .filter(|e| e.grants_access());
    let Some(entitlement) = entitlement else {
        tracing::debug!(content_id, "no active entitlement");
        return Err(AccessError::AccessDenied);
    };

    let unavailable = || AccessError::ContentUnavailable {
        content_id: content_id.to_string(),
    };
    let content = entitlement.content.ok_or_else(unavailable)?;
    let location = content
        .file_url
        .as_deref()
        .and_then(|raw| StorageLocation::parse(raw, signer.base_url()))
        .ok_or_else(unavailable)?;

    let (url, signed, expires_at) = match &location {
        StorageLocation::External { url } => (url.clone(), false, None),
        StorageLocation::PlatformUrl { url, reference } => {
            match sign(signer, reference).await {
                Some((signed_url, expires)) => (signed_url, true, Some(expires)),
                None => (url.clone(), false, None),
            }
        }
        StorageLocation::PlatformObject { reference } => {
            match sign(signer, reference).await {
                Some((signed_url, expires)) => (signed_url, true, Some(expires)),
                None => (
                    signer.public_url(&reference.bucket, &reference.path),
                    false,
                    None,
                ),
            }
        }
    };

    Ok(RetrievalDescriptor {
        content_id: content_id.to_string(),
        title: content.title,
        url,
        signed,
        expires_at,
    })
}

/// Best-effort signing. A failure is logged and absorbed.
async fn sign<G>(signer: &G, reference: &PlatformStorageRef) -> Option<(String, OffsetDateTime)>
where
    G: ObjectSigner + ?Sized,
{
    let requested_at = OffsetDateTime::now_utc();
    match signer
        .create_signed_url(&reference.bucket, &reference.path, SIGNED_URL_TTL)
        .await
    {
        Ok(url) => Some((url, requested_at + SIGNED_URL_TTL)),
        Err(e) => {
            tracing::warn!(
                object = %reference,
                error = %e,
                "signing failed; using unsigned location"
            );
            None
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
