//! Raw-text cleanup applied before the AOI table is parsed.

/// Normalizes raw CSV text.
///
/// Non-breaking spaces (U+00A0) are replaced with plain spaces, since
/// exported tables often use them between WKT coordinates, and a leading
/// UTF-8 byte-order mark is dropped. Returns the cleaned text and whether
/// anything changed.
#[must_use]
pub fn normalize(raw: &str) -> (String, bool) {
    let without_bom = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let cleaned = without_bom.replace('\u{a0}', " ");
    let changed = cleaned.len() != raw.len() || cleaned != raw;
    (cleaned, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_non_breaking_spaces() {
        let (text, changed) = normalize("POLYGON ((1\u{a0}2, 3\u{a0}4))");
        assert_eq!(text, "POLYGON ((1 2, 3 4))");
        assert!(changed);
    }

    #[test]
    fn strips_byte_order_mark() {
        let (text, changed) = normalize("\u{feff}aoi_address,centroid,wkt\n");
        assert_eq!(text, "aoi_address,centroid,wkt\n");
        assert!(changed);
    }

    #[test]
    fn leaves_clean_text_alone() {
        let (text, changed) = normalize("a,b,c\n1,2,3\n");
        assert_eq!(text, "a,b,c\n1,2,3\n");
        assert!(!changed);
    }
}
