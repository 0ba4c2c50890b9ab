//! # MIME Sniffing and Equivalence
//!
//! The finalizer's content-correctness gate (spec.md §4.4): sniff the
//! first bytes of a finished object via magic numbers, then compare
//! against the claimed MIME type through an alias table instead of exact
//! string equality, since many equally-correct MIME strings describe the
//! same format (`image/jpg` vs `image/jpeg`, etc).

/// Equivalence classes of MIME types that should not trip a mismatch.
/// Each inner slice is one class; membership, not position, matters.
const EQUIVALENCE_CLASSES: &[&[&str]] = &[
    &["image/jpg", "image/jpeg"],
    &["video/x-matroska", "video/matroska"],
    &["application/x-zip-compressed", "application/zip"],
    &["audio/mp3", "audio/mpeg"],
    &["font/ttf", "application/x-font-ttf"],
    &["font/otf", "application/x-font-opentype"],
];

/// Lowercases and strips any `; charset=...`-style parameter, the two
/// normalizations that make otherwise-identical claims compare unequal.
pub fn normalize(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_lowercase()
}

/// Whether two MIME types should be treated as the same format.
pub fn equivalent(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return true;
    }

    EQUIVALENCE_CLASSES
        .iter()
        .any(|class| class.contains(&a.as_str()) && class.contains(&b.as_str()))
}

/// Sniffs the MIME type from a finalized object's leading bytes. Returns
/// `None` when `infer` can't classify the sample (e.g. plain text); the
/// finalizer treats that as `application/octet-stream` per spec.md §4.4
/// step 2, so an unclassifiable sample still fails the equivalence check
/// against any specific claimed type.
pub fn sniff(window: &[u8]) -> Option<String> {
    infer::get(window).map(|kind| kind.mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("IMAGE/JPG; charset=binary");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn equivalent_is_symmetric() {
        assert_eq!(equivalent("image/jpg", "image/jpeg"), equivalent("image/jpeg", "image/jpg"));
    }

    #[test]
    fn equivalent_recognizes_known_aliases() {
        assert!(equivalent("video/x-matroska", "video/matroska"));
        assert!(equivalent("AUDIO/MP3", "audio/mpeg"));
    }

    #[test]
    fn equivalent_rejects_unrelated_types() {
        assert!(!equivalent("image/png", "application/pdf"));
    }

    #[test]
    fn sniff_recognizes_png_magic_bytes() {
        let png_header: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff(png_header).as_deref(), Some("image/png"));
    }

    #[test]
    fn sniff_returns_none_for_unrecognized_bytes() {
        assert_eq!(sniff(b"just some plain text"), None);
    }
}
