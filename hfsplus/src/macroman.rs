//! Mac OS Roman decoding for classic-HFS volume names and catalog keys.
//!
//! Bytes 0x00-0x7F are ASCII; 0x80-0xFF map through the standard Mac OS
//! Roman table (the same table `libfshfs` and the classic Finder use).

const HIGH_HALF: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', 'ê', 'ë', 'í',
    'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', '†', '°', '¢', '£', '§', '•',
    '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏',
    'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{a0}',
    'À', 'Ã', 'Õ', 'Œ', 'œ', '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›',
    'ﬁ', 'ﬂ', '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', '\u{f8ff}',
    'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

/// Decode a MacRoman byte string to UTF-8.
pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                HIGH_HALF[(b - 0x80) as usize]
            }
        })
        .collect()
}

/// Decode a Pascal string (one length byte followed by up to 255 data bytes)
/// padded to a fixed field width, as used for classic-HFS volume names.
pub fn decode_pascal_string(field: &[u8]) -> String {
    let len = field.first().copied().unwrap_or(0) as usize;
    let len = len.min(field.len().saturating_sub(1));
    decode(&field[1..1 + len])
}

fn ascii_upper_fold(c: char) -> char {
    if c.is_ascii_lowercase() {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

/// Classic-HFS name comparison: case-insensitive over the decoded MacRoman
/// text, folding only the ASCII range (matching the common-path behavior of
/// the classic Finder's `RelString`; accented letters compare by codepoint).
pub fn compare_case_insensitive(a: &str, b: &str) -> std::cmp::Ordering {
    let a_folded = a.chars().map(ascii_upper_fold);
    let b_folded = b.chars().map(ascii_upper_fold);
    a_folded.cmp(b_folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ascii_passthrough() {
        assert_eq!(decode(b"Macintosh HD"), "Macintosh HD");
    }

    #[test]
    fn decodes_high_half_accents() {
        assert_eq!(decode(&[0x8E]), "é");
    }

    #[test]
    fn pascal_string_respects_length_byte() {
        let mut field = [0u8; 28];
        field[0] = 4;
        field[1..5].copy_from_slice(b"Test");
        assert_eq!(decode_pascal_string(&field), "Test");
    }
}
