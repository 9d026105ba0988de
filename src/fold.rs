//! Diacritic folding for Swedish and Nordic place names
//!
//! Station names in the SMHI metadata use native spelling ("Göteborg A",
//! "Umeå Flygplats") while users often type the ASCII form. Folding both
//! sides to lowercase ASCII makes substring matching work either way.
//!
//! Only the two-byte UTF-8 sequences for å ä ö é è ø æ (both cases) are
//! folded. Every other byte is ASCII-lowercased and passed through.

/// Folds `text` to lowercase ASCII, replacing Nordic diacritics.
///
/// The function is pure and idempotent: `fold(&fold(x)) == fold(x)`.
pub fn fold(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == 0xC3 && i + 1 < bytes.len() {
            if let Some(replacement) = fold_pair(bytes[i + 1]) {
                out.extend_from_slice(replacement);
                i += 2;
                continue;
            }
        }
        out.push(c.to_ascii_lowercase());
        i += 1;
    }

    // Only ASCII bytes were substituted, so any multi-byte sequence we did
    // not recognise is copied through intact.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Maps the second byte of a `0xC3 xx` sequence to its ASCII replacement.
fn fold_pair(second: u8) -> Option<&'static [u8]> {
    match second {
        0xA5 | 0x85 => Some(b"a"),  // å Å
        0xA4 | 0x84 => Some(b"a"),  // ä Ä
        0xB6 | 0x96 => Some(b"o"),  // ö Ö
        0xA9 | 0x89 => Some(b"e"),  // é É
        0xA8 | 0x88 => Some(b"e"),  // è È
        0xB8 | 0x98 => Some(b"o"),  // ø Ø
        0xA6 | 0x86 => Some(b"ae"), // æ Æ
        _ => None,
    }
}

/// Substring test after folding both sides.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(&fold(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_swedish_letters() {
        assert_eq!(fold("Göteborg"), "goteborg");
        assert_eq!(fold("Västerås"), "vasteras");
        assert_eq!(fold("ÖSTERSUND"), "ostersund");
        assert_eq!(fold("Ängelholm"), "angelholm");
        assert_eq!(fold("Umeå Flygplats"), "umea flygplats");
    }

    #[test]
    fn test_fold_other_nordic_letters() {
        assert_eq!(fold("Blåbærøy"), "blabaeroy");
        assert_eq!(fold("ÆRØ"), "aero");
        assert_eq!(fold("Café Crème"), "cafe creme");
    }

    #[test]
    fn test_fold_passes_unknown_sequences_through() {
        // ü is 0xC3 0xBC, which is not folded
        assert_eq!(fold("Zürich"), "zürich");
        assert_eq!(fold("Łódź"), "Łódź");
    }

    #[test]
    fn test_fold_is_idempotent() {
        for input in ["Göteborg", "Malmö A", "Kiruna Flygplats", "ÆØÅ", "Zürich", ""] {
            let once = fold(input);
            assert_eq!(fold(&once), once, "fold should be idempotent for {input}");
        }
    }

    #[test]
    fn test_fold_is_case_insensitive() {
        for input in ["STOCKHOLM", "Luleå", "Sigtuna Kommun", "Upplands-Bro"] {
            assert_eq!(fold(input), fold(&input.to_lowercase()));
        }
    }

    #[test]
    fn test_contains_folded() {
        assert!(contains_folded("Göteborg A", "goteborg"));
        assert!(contains_folded("Stockholm-Observatoriekullen A", "STOCKHOLM"));
        assert!(contains_folded("Malmö A", "Malmö"));
        assert!(!contains_folded("Nacka", "stockholm"));
    }
}
