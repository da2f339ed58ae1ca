//! Image URL extraction from archived HTML.
//!
//! Uses the `scraper` crate (html5ever underneath), which recovers from any
//! malformed markup instead of failing, so a broken page yields whatever
//! candidates the parser could still see.
//!
//! html5ever parses with scripting enabled, which leaves `<noscript>` content
//! as raw text. Lazy-loading pages often keep their real `<img>` there, so
//! that text is parsed again as a fragment.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::types::{IngestError, IngestResult};

/// Collect absolute image URLs referenced by `html`, resolved against `origin`.
///
/// Candidates come from `img[src]` first, then `link` elements declaring an
/// `image/*` type or the `image_src` relation. The result holds only
/// `http`/`https` URLs with a host, deduplicated in first-seen order. A page
/// that cannot be processed yields no candidates.
pub fn extract_image_urls(html: &[u8], origin: &str) -> Vec<String> {
    try_extract_image_urls(html, origin).unwrap_or_else(|e| {
        tracing::warn!(origin = %origin, "Error parsing HTML: {e}");
        Vec::new()
    })
}

/// Like [`extract_image_urls`], but reports why a page produced nothing.
pub fn try_extract_image_urls(html: &[u8], origin: &str) -> IngestResult<Vec<String>> {
    let base = Url::parse(origin.trim()).map_err(|e| {
        IngestError::HtmlParseFailed(format!("origin {origin:?} is not a usable base URL: {e}"))
    })?;

    let document = Html::parse_document(&String::from_utf8_lossy(html));
    if !document.errors.is_empty() {
        tracing::trace!(origin = %origin, errors = document.errors.len(), "Recovered from malformed markup");
    }

    let mut candidates: Vec<String> = Vec::new();

    if let Ok(sel) = Selector::parse("img[src], noscript") {
        for el in document.select(&sel) {
            if el.value().name() == "noscript" {
                candidates.extend(noscript_sources(&el));
            } else if let Some(src) = el.value().attr("src") {
                candidates.push(src.to_string());
            }
        }
    }

    if let Ok(sel) = Selector::parse("link[href]") {
        candidates.extend(
            document
                .select(&sel)
                .filter(is_image_link)
                .filter_map(|el| el.value().attr("href"))
                .map(str::to_string),
        );
    }

    let mut seen = HashSet::new();
    Ok(candidates
        .into_iter()
        .filter_map(|raw| resolve_candidate(&base, &raw))
        .filter(|url| seen.insert(url.clone()))
        .collect())
}

/// `img[src]` values inside a `<noscript>` element, in document order.
fn noscript_sources(el: &ElementRef<'_>) -> Vec<String> {
    let text: String = el.text().collect();
    if !text.contains('<') {
        return Vec::new();
    }

    let fragment = Html::parse_fragment(&text);
    match Selector::parse("img[src]") {
        Ok(sel) => fragment
            .select(&sel)
            .filter_map(|img| img.value().attr("src"))
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn is_image_link(el: &ElementRef<'_>) -> bool {
    let declares_image = el
        .value()
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);

    let image_src_rel = el
        .value()
        .attr("rel")
        .map(|rel| {
            rel.split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("image_src"))
        })
        .unwrap_or(false);

    declares_image || image_src_rel
}

/// Resolve one raw reference, returning `None` for anything that is not a
/// fetchable network image reference.
fn resolve_candidate(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    let inline = raw
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"));
    if raw.is_empty() || inline {
        return None;
    }

    let resolved = base.join(raw).ok()?;
    is_valid_image_url(&resolved).then(|| resolved.to_string())
}

/// An image URL must be plain HTTP(S) with a host.
pub fn is_valid_image_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}
