//! Source-citation derivation
//!
//! The chat endpoint reports resources as paths under the resource center.
//! Resolution rewrites each path against the fixed base, fills in a missing
//! image extension, derives a short title from the trailing segment, and
//! reclassifies anything that resolves to an image path.

use mime_guess::mime;

use crate::models::{RawResource, Source, SourceKind};

/// Fixed base every server-reported resource path is rewritten under.
pub const RESOURCE_CENTER_BASE: &str = "https://resources.dockchat.app";

const TITLE_MAX_CHARS: usize = 20;

/// Resolves a batch of server resource descriptors. The result replaces any
/// previously accumulated source list wholesale.
pub fn resolve_sources(raw: Vec<RawResource>) -> Vec<Source> {
    raw.into_iter().map(resolve_source).collect()
}

fn resolve_source(raw: RawResource) -> Source {
    let declared_image = raw.kind.as_deref() == Some("image");

    let mut path = extract_path(&raw.url);
    if declared_image && !has_extension(&path) {
        path.push_str(".png");
    }

    let url = format!("{}{}", RESOURCE_CENTER_BASE.trim_end_matches('/'), path);

    // Image extensions win over whatever the server declared.
    let kind = if is_image_path(&path) {
        SourceKind::Image
    } else if declared_image {
        SourceKind::Image
    } else {
        SourceKind::Url
    };

    let title = raw.title.filter(|t| !t.is_empty()).or_else(|| derive_title(&path));

    Source { kind, url, title }
}

/// Path portion of a resource URL: absolute URLs are stripped to their
/// path, bare paths gain a leading slash.
fn extract_path(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    let path = match rest {
        Some(after_scheme) => match after_scheme.find('/') {
            Some(idx) => &after_scheme[idx..],
            None => "/",
        },
        None => url,
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn trailing_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

fn has_extension(path: &str) -> bool {
    trailing_segment(path).contains('.')
}

fn is_image_path(path: &str) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.type_() == mime::IMAGE)
        .unwrap_or(false)
}

/// Title from the trailing path segment: percent-decoded and cut to 20
/// characters plus an ellipsis.
fn derive_title(path: &str) -> Option<String> {
    let segment = trailing_segment(path);
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    if decoded.chars().count() > TITLE_MAX_CHARS {
        let cut: String = decoded.chars().take(TITLE_MAX_CHARS).collect();
        Some(format!("{}...", cut))
    } else {
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: Option<&str>, url: &str, title: Option<&str>) -> RawResource {
        RawResource {
            kind: kind.map(str::to_string),
            url: url.to_string(),
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn absolute_url_is_rewritten_under_the_resource_center() {
        let sources = resolve_sources(vec![raw(Some("url"), "https://x/docs/guide.pdf", None)]);
        assert_eq!(sources[0].url, format!("{}/docs/guide.pdf", RESOURCE_CENTER_BASE));
        assert_eq!(sources[0].kind, SourceKind::Url);
    }

    #[test]
    fn declared_image_without_extension_gains_png() {
        let sources = resolve_sources(vec![raw(Some("image"), "https://x/y/img", None)]);
        assert_eq!(sources[0].url, format!("{}/y/img.png", RESOURCE_CENTER_BASE));
        assert_eq!(sources[0].kind, SourceKind::Image);
    }

    #[test]
    fn image_extension_reclassifies_a_declared_url() {
        let sources = resolve_sources(vec![raw(Some("url"), "/shots/screen.jpg", None)]);
        assert_eq!(sources[0].kind, SourceKind::Image);
    }

    #[test]
    fn relative_path_gains_a_leading_slash() {
        let sources = resolve_sources(vec![raw(Some("url"), "kb/answer.html", None)]);
        assert_eq!(sources[0].url, format!("{}/kb/answer.html", RESOURCE_CENTER_BASE));
    }

    #[test]
    fn title_derives_from_decoded_trailing_segment() {
        let sources = resolve_sources(vec![raw(Some("url"), "/docs/getting%20started.pdf", None)]);
        assert_eq!(sources[0].title.as_deref(), Some("getting started.pdf"));
    }

    #[test]
    fn long_titles_truncate_with_ellipsis() {
        let sources = resolve_sources(vec![raw(
            Some("url"),
            "/docs/a-very-long-document-name.pdf",
            None,
        )]);
        let title = sources[0].title.as_deref().unwrap();
        assert_eq!(title, "a-very-long-document...");
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn server_title_wins_when_present() {
        let sources = resolve_sources(vec![raw(Some("url"), "/docs/x.pdf", Some("Manual"))]);
        assert_eq!(sources[0].title.as_deref(), Some("Manual"));
    }
}
