//! Static phrases used when the remote translator is unreachable

/// Returned when no fallback phrase exists for a language pair
pub const FALLBACK_SENTINEL: &str = "Translation not available";

/// `(source, target, phrase)` keyed by base codes
const PHRASES: &[(&str, &str, &str)] = &[
    ("en", "es", "Hola, ¿cómo estás?"),
    ("en", "fr", "Bonjour, comment allez-vous?"),
    ("en", "de", "Hallo, wie geht es dir?"),
    ("en", "hi", "नमस्ते, आप कैसे हैं?"),
    ("es", "en", "Hello, how are you?"),
    ("es", "fr", "Bonjour, comment allez-vous?"),
    ("es", "hi", "नमस्ते, आप कैसे हैं?"),
];

/// Fallback phrase for a base-code pair
#[must_use]
pub fn lookup(source: &str, target: &str) -> Option<&'static str> {
    PHRASES
        .iter()
        .find(|(s, t, _)| s.eq_ignore_ascii_case(source) && t.eq_ignore_ascii_case(target))
        .map(|(_, _, phrase)| *phrase)
}
