//! HFS+/HFSX Unicode name comparison.
//!
//! HFSX (case-sensitive) uses binary comparison of UTF-16BE code units.
//! HFS+ (case-insensitive) uses Apple's FastUnicodeCompare with a
//! case-folding table defined in Apple TN1150.

use std::cmp::Ordering;

/// Compare two HFS+ Unicode names using binary comparison (HFSX / case-sensitive).
pub fn compare_binary(a: &[u16], b: &[u16]) -> Ordering {
    let len = a.len().min(b.len());
    for i in 0..len {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

/// Case-folding table for HFS+ FastUnicodeCompare (from Apple TN1150).
/// Maps Unicode code points to their case-folded equivalents.
/// Only entries that differ from identity are listed.
static CASE_FOLD: &[(u16, u16)] = &[
    (0x0041, 0x0061),
    (0x0042, 0x0062),
    (0x0043, 0x0063),
    (0x0044, 0x0064),
    (0x0045, 0x0065),
    (0x0046, 0x0066),
    (0x0047, 0x0067),
    (0x0048, 0x0068),
    (0x0049, 0x0069),
    (0x004A, 0x006A),
    (0x004B, 0x006B),
    (0x004C, 0x006C),
    (0x004D, 0x006D),
    (0x004E, 0x006E),
    (0x004F, 0x006F),
    (0x0050, 0x0070),
    (0x0051, 0x0071),
    (0x0052, 0x0072),
    (0x0053, 0x0073),
    (0x0054, 0x0074),
    (0x0055, 0x0075),
    (0x0056, 0x0076),
    (0x0057, 0x0077),
    (0x0058, 0x0078),
    (0x0059, 0x0079),
    (0x005A, 0x007A),
    (0x00C0, 0x00E0),
    (0x00C1, 0x00E1),
    (0x00C2, 0x00E2),
    (0x00C3, 0x00E3),
    (0x00C4, 0x00E4),
    (0x00C5, 0x00E5),
    (0x00C6, 0x00E6),
    (0x00C7, 0x00E7),
    (0x00C8, 0x00E8),
    (0x00C9, 0x00E9),
    (0x00CA, 0x00EA),
    (0x00CB, 0x00EB),
    (0x00CC, 0x00EC),
    (0x00CD, 0x00ED),
    (0x00CE, 0x00EE),
    (0x00CF, 0x00EF),
    (0x00D0, 0x00F0),
    (0x00D1, 0x00F1),
    (0x00D2, 0x00F2),
    (0x00D3, 0x00F3),
    (0x00D4, 0x00F4),
    (0x00D5, 0x00F5),
    (0x00D6, 0x00F6),
    (0x00D8, 0x00F8),
    (0x00D9, 0x00F9),
    (0x00DA, 0x00FA),
    (0x00DB, 0x00FB),
    (0x00DC, 0x00FC),
    (0x00DD, 0x00FD),
    (0x00DE, 0x00FE),
    (0x0100, 0x0101),
    (0x0102, 0x0103),
    (0x0104, 0x0105),
    (0x0106, 0x0107),
    (0x0108, 0x0109),
    (0x010A, 0x010B),
    (0x010C, 0x010D),
    (0x010E, 0x010F),
    (0x0110, 0x0111),
    (0x0112, 0x0113),
    (0x0114, 0x0115),
    (0x0116, 0x0117),
    (0x0118, 0x0119),
    (0x011A, 0x011B),
    (0x011C, 0x011D),
    (0x011E, 0x011F),
    (0x0120, 0x0121),
    (0x0122, 0x0123),
    (0x0124, 0x0125),
    (0x0126, 0x0127),
    (0x0128, 0x0129),
    (0x012A, 0x012B),
    (0x012C, 0x012D),
    (0x012E, 0x012F),
    (0x0130, 0x0069),
    (0x0132, 0x0133),
    (0x0134, 0x0135),
    (0x0136, 0x0137),
    (0x0139, 0x013A),
    (0x013B, 0x013C),
    (0x013D, 0x013E),
    (0x013F, 0x0140),
    (0x0141, 0x0142),
    (0x0143, 0x0144),
    (0x0145, 0x0146),
    (0x0147, 0x0148),
    (0x014A, 0x014B),
    (0x014C, 0x014D),
    (0x014E, 0x014F),
    (0x0150, 0x0151),
    (0x0152, 0x0153),
    (0x0154, 0x0155),
    (0x0156, 0x0157),
    (0x0158, 0x0159),
    (0x015A, 0x015B),
    (0x015C, 0x015D),
    (0x015E, 0x015F),
    (0x0160, 0x0161),
    (0x0162, 0x0163),
    (0x0164, 0x0165),
    (0x0166, 0x0167),
    (0x0168, 0x0169),
    (0x016A, 0x016B),
    (0x016C, 0x016D),
    (0x016E, 0x016F),
    (0x0170, 0x0171),
    (0x0172, 0x0173),
    (0x0174, 0x0175),
    (0x0176, 0x0177),
    (0x0178, 0x00FF),
    (0x0179, 0x017A),
    (0x017B, 0x017C),
    (0x017D, 0x017E),
];

fn case_fold(c: u16) -> u16 {
    match CASE_FOLD.binary_search_by_key(&c, |&(from, _)| from) {
        Ok(idx) => CASE_FOLD[idx].1,
        Err(_) => c,
    }
}

/// Compare two HFS+ Unicode names using FastUnicodeCompare (case-insensitive).
pub fn compare_case_insensitive(a: &[u16], b: &[u16]) -> Ordering {
    let len = a.len().min(b.len());
    for i in 0..len {
        match case_fold(a[i]).cmp(&case_fold(b[i])) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

/// Which name comparator a catalog/attributes B-tree uses, selected once at
/// volume-open time from the dialect and (for HFS+) the header's
/// `key_compare_type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameComparator {
    /// Classic HFS: case-insensitive MacRoman comparison.
    MacRoman,
    /// HFS+: case-insensitive Unicode FastUnicodeCompare.
    CaseInsensitiveUnicode,
    /// HFSX with key_compare_type != 0: binary UTF-16 comparison.
    BinaryUnicode,
}

impl NameComparator {
    pub fn compare_utf16(self, a: &[u16], b: &[u16]) -> Ordering {
        match self {
            NameComparator::CaseInsensitiveUnicode => compare_case_insensitive(a, b),
            NameComparator::BinaryUnicode => compare_binary(a, b),
            NameComparator::MacRoman => {
                let sa = utf16_to_string(a);
                let sb = utf16_to_string(b);
                crate::macroman::compare_case_insensitive(&sa, &sb)
            }
        }
    }
}

/// Convert a UTF-16BE byte slice to a Vec<u16> of code points.
pub fn utf16be_to_u16(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Convert a Vec<u16> of UTF-16 code points to a Rust String.
pub fn utf16_to_string(code_points: &[u16]) -> String {
    String::from_utf16_lossy(code_points)
}

/// Encode a Rust string to HFS+ UTF-16 code points.
pub fn string_to_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_compare() {
        let a = string_to_utf16("abc");
        let b = string_to_utf16("abd");
        assert_eq!(compare_binary(&a, &b), Ordering::Less);

        let a = string_to_utf16("abc");
        let b = string_to_utf16("abc");
        assert_eq!(compare_binary(&a, &b), Ordering::Equal);

        let a = string_to_utf16("abc");
        let b = string_to_utf16("ab");
        assert_eq!(compare_binary(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_case_insensitive_compare() {
        let a = string_to_utf16("ABC");
        let b = string_to_utf16("abc");
        assert_eq!(compare_case_insensitive(&a, &b), Ordering::Equal);

        let a = string_to_utf16("Hello");
        let b = string_to_utf16("hello");
        assert_eq!(compare_case_insensitive(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_utf16_roundtrip() {
        let original = "Hello, World!";
        let utf16 = string_to_utf16(original);
        let back = utf16_to_string(&utf16);
        assert_eq!(original, back);
    }

    #[test]
    fn hfsx_distinguishes_case() {
        let a = string_to_utf16("A");
        let b = string_to_utf16("a");
        assert_ne!(
            NameComparator::BinaryUnicode.compare_utf16(&a, &b),
            Ordering::Equal
        );
        assert_eq!(
            NameComparator::CaseInsensitiveUnicode.compare_utf16(&a, &b),
            Ordering::Equal
        );
    }
}
