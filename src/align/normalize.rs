use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Punctuation stripped from Latin/transliterated text before comparison
const LATIN_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '"', '\'', '-'];

/// Script classification for normalization. Mixed strings count as Arabic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Arabic,
    Latin,
}

impl Script {
    /// Classify a string by Unicode block membership of its characters.
    pub fn detect(text: &str) -> Self {
        if is_arabic(text) {
            Script::Arabic
        } else {
            Script::Latin
        }
    }
}

/// True if the text contains at least one code point in the Arabic blocks.
pub fn is_arabic(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
    })
}

/// Canonicalize text for comparison. Pure; empty input yields empty output.
///
/// Arabic: NFKD-decompose, drop combining marks (tashkeel), collapse
/// whitespace, lowercase. Latin: lowercase, strip punctuation, collapse
/// whitespace.
pub fn normalize(text: &str, script: Script) -> String {
    if text.is_empty() {
        return String::new();
    }
    match script {
        Script::Arabic => {
            let stripped: String = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();
            collapse_whitespace(&stripped).to_lowercase()
        }
        Script::Latin => {
            let lowered = text.to_lowercase();
            let stripped: String = lowered
                .chars()
                .filter(|c| !LATIN_PUNCTUATION.contains(c))
                .collect();
            collapse_whitespace(&stripped)
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_arabic() {
        assert_eq!(Script::detect("بسم"), Script::Arabic);
        assert_eq!(Script::detect("bismillah"), Script::Latin);
        // Mixed strings classify as Arabic
        assert_eq!(Script::detect("ayah بسم"), Script::Arabic);
        assert_eq!(Script::detect(""), Script::Latin);
    }

    #[test]
    fn test_normalize_arabic_strips_diacritics() {
        let with_tashkeel = "بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ";
        let normalized = normalize(with_tashkeel, Script::Arabic);
        assert!(normalized.chars().count() < with_tashkeel.chars().count());
        assert!(normalized.contains("بسم"));
        // No combining marks survive
        assert!(!normalized.chars().any(is_combining_mark));
    }

    #[test]
    fn test_normalize_arabic_collapses_whitespace() {
        assert_eq!(
            normalize("  بسم   الله ", Script::Arabic),
            "بسم الله"
        );
    }

    #[test]
    fn test_normalize_latin() {
        assert_eq!(
            normalize("Bismillah-ir-Rahman, ir-Raheem!", Script::Latin),
            "bismillahirrahman irraheem"
        );
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize("", Script::Arabic), "");
        assert_eq!(normalize("", Script::Latin), "");
    }
}
