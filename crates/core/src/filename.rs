//! Local filenames for downloaded documents.

use url::Url;

const DEFAULT_EXTENSION: &str = "pdf";
const FALLBACK_STEM: &str = "document";

/// Derive a filesystem-safe filename from a document title.
///
/// The title is lower-cased and every run of non-alphanumeric ASCII is
/// collapsed to a single `_`. The extension comes from the last path
/// segment of `url` when it has a short alphanumeric one, else `pdf`.
pub fn download_filename(title: &str, url: Option<&str>) -> String {
    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };

    let extension = url
        .and_then(extension_of)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{stem}.{extension}")
}

fn extension_of(raw: &str) -> Option<String> {
    let path = match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_title() {
        assert_eq!(
            download_filename("Bookkeeping 101: The Basics!", None),
            "bookkeeping_101_the_basics.pdf"
        );
    }

    #[test]
    fn takes_extension_from_url() {
        assert_eq!(
            download_filename("Shop Guide", Some("https://cdn.example.com/a/guide.EPUB?dl=1")),
            "shop_guide.epub"
        );
        assert_eq!(
            download_filename("Shop Guide", Some("books/guide.mobi")),
            "shop_guide.mobi"
        );
    }

    #[test]
    fn ignores_odd_extensions() {
        assert_eq!(
            download_filename("x", Some("https://example.com/file.tar-gz-long")),
            "x.pdf"
        );
        assert_eq!(
            download_filename("x", Some("https://example.com/download")),
            "x.pdf"
        );
    }

    #[test]
    fn empty_title_falls_back() {
        assert_eq!(download_filename("  ***  ", None), "document.pdf");
        assert_eq!(download_filename("Café", None), "caf.pdf");
    }
}
