//! Document location parsing.
//!
//! A stored document location is one of:
//! - an absolute URL into the platform's own object storage
//!   (`<platform>/storage/v1/object/{public|authenticated|sign}/<bucket>/<path>`)
//! - an opaque `bucket/path` object reference
//! - anything else, which is handed to the viewer unchanged
//!
//! Object keys are held decoded. A storage URL on any other origin, even
//! one with the same path layout, is external.

use std::fmt;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

/// Path markers that introduce `<bucket>/<path>` in a storage URL.
const OBJECT_MARKERS: [&str; 3] = [
    "/storage/v1/object/public/",
    "/storage/v1/object/authenticated/",
    "/storage/v1/object/sign/",
];

/// A bucket-scoped object path in platform storage. `path` is the
/// decoded object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlatformStorageRef {
    pub bucket: String,
    pub path: String,
}

impl PlatformStorageRef {
    /// Split `bucket/path`; both halves must be non-empty.
    fn split(raw: &str) -> Option<Self> {
        let (bucket, path) = raw.split_once('/')?;
        if bucket.is_empty() || path.is_empty() {
            return None;
        }
        Some(PlatformStorageRef {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }

    /// Split a percent-encoded URL path tail.
    fn from_encoded(encoded: &str) -> Option<Self> {
        let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
        Self::split(&decoded)
    }
}

impl fmt::Display for PlatformStorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

/// A parsed document location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageLocation {
    /// Absolute URL pointing into platform storage.
    PlatformUrl {
        url: String,
        reference: PlatformStorageRef,
    },
    /// Scheme-less `bucket/path` reference.
    PlatformObject { reference: PlatformStorageRef },
    /// Not platform storage.
    External { url: String },
}

impl StorageLocation {
    /// Parse a stored location. Returns `None` for a blank location.
    ///
    /// `platform_base` is the storage service's base URL. Only URLs with
    /// the same scheme, host and port are platform storage.
    pub fn parse(raw: &str, platform_base: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if raw.contains("://") {
            return Some(match Url::parse(raw) {
                Ok(url) => match platform_ref_in_url(&url, platform_base) {
                    Some(reference) => StorageLocation::PlatformUrl {
                        url: raw.to_string(),
                        reference,
                    },
                    None => StorageLocation::External {
                        url: raw.to_string(),
                    },
                },
                Err(e) => {
                    tracing::debug!(location = raw, error = %e, "unparseable URL passed through");
                    StorageLocation::External {
                        url: raw.to_string(),
                    }
                }
            });
        }

        if !raw.starts_with('/') {
            if let Some(reference) = PlatformStorageRef::split(raw) {
                return Some(StorageLocation::PlatformObject { reference });
            }
        }
        Some(StorageLocation::External {
            url: raw.to_string(),
        })
    }

    /// The platform object this location names, if any.
    pub fn platform_ref(&self) -> Option<&PlatformStorageRef> {
        match self {
            StorageLocation::PlatformUrl { reference, .. }
            | StorageLocation::PlatformObject { reference } => Some(reference),
            StorageLocation::External { .. } => None,
        }
    }
}

fn platform_ref_in_url(url: &Url, platform_base: &str) -> Option<PlatformStorageRef> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let platform = Url::parse(platform_base).ok()?;
    if url.origin() != platform.origin() {
        return None;
    }
    let path = url.path();
    OBJECT_MARKERS.iter().find_map(|marker| {
        let start = path.find(marker)? + marker.len();
        PlatformStorageRef::from_encoded(&path[start..])
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
