//! `ETag` validators for static responses

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Strong validator built from the body length and a content hash
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// True when `If-None-Match` lists `etag` or `*`
///
/// Comparison is weak, as required for `If-None-Match`: a `W/` prefix on
/// the client's tag is ignored.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let Some(header) = if_none_match else {
        return false;
    };
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_tracks_content() {
        let etag = generate_etag(b"<html></html>");
        assert!(etag.starts_with("\"d-"));
        assert!(etag.ends_with('"'));
        assert_eq!(etag, generate_etag(b"<html></html>"));
        assert_ne!(etag, generate_etag(b"<html> </html>"));
    }

    #[test]
    fn test_if_none_match_forms() {
        let etag = generate_etag(b"bundle");
        assert!(check_etag_match(Some(&etag), &etag));
        assert!(check_etag_match(Some(&format!("\"other\", {etag}")), &etag));
        assert!(check_etag_match(Some(&format!("W/{etag}")), &etag));
        assert!(check_etag_match(Some("*"), &etag));
        assert!(!check_etag_match(Some("\"other\""), &etag));
        assert!(!check_etag_match(None, &etag));
    }
}
