//! Phone number normalization.

/// Characters stripped from every phone number before storage or comparison.
const PHONE_PUNCTUATION: &[char] = &['(', ')', '-', ' ', '+'];

/// Reduce a phone number to its canonical digit-only form.
///
/// Punctuation and spaces are removed, and a leading country code `1` is
/// dropped when the remainder would otherwise be 11 characters long, so
/// `"+1 (706) 781-5146"` and `"7067815146"` normalize identically.
pub fn normalize_phone(number: &str) -> String {
    let cleaned: String = number
        .chars()
        .filter(|c| !PHONE_PUNCTUATION.contains(c))
        .collect();

    if cleaned.len() == 11 && cleaned.starts_with('1') {
        cleaned[1..].to_string()
    } else {
        cleaned
    }
}

/// Compare two phone numbers by their normalized forms.
pub fn same_phone(a: &str, b: &str) -> bool {
    normalize_phone(a) == normalize_phone(b)
}
