use std::sync::OnceLock;

use regex::Regex;

fn issn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{7}[0-9X]$").expect("static ISSN pattern"))
}

/// Normalizes an ISSN to its 8-character joined form: separators and spaces
/// stripped, check digit uppercased. Returns `None` for anything that is not
/// a structurally valid ISSN.
///
/// Two journals with the same normalized ISSN are treated as the same entity
/// for quartile joins, regardless of provider identifiers.
pub fn normalize_issn(raw: &str) -> Option<String> {
    let joined: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if issn_pattern().is_match(&joined) {
        Some(joined)
    } else {
        None
    }
}

/// Formats a normalized 8-character ISSN as `XXXX-XXXX` (the form OpenAlex
/// expects in `issn:` lookups). Input that is not 8 characters is returned
/// unchanged.
pub fn dashed(normalized: &str) -> String {
    if normalized.len() == 8 {
        format!("{}-{}", &normalized[..4], &normalized[4..])
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_dashed_and_joined() {
        assert_eq!(normalize_issn("1234-5678"), Some("12345678".into()));
        assert_eq!(normalize_issn("12345678"), Some("12345678".into()));
        assert_eq!(normalize_issn(" 1234 5678 "), Some("12345678".into()));
    }

    #[test]
    fn normalize_uppercases_check_digit() {
        assert_eq!(normalize_issn("2049-363x"), Some("2049363X".into()));
    }

    #[test]
    fn normalize_rejects_invalid() {
        assert_eq!(normalize_issn(""), None);
        assert_eq!(normalize_issn("1234-567"), None);
        assert_eq!(normalize_issn("1234-56789"), None);
        assert_eq!(normalize_issn("X2345678"), None);
        assert_eq!(normalize_issn("not an issn"), None);
    }

    #[test]
    fn dashed_splits_joined_form() {
        assert_eq!(dashed("12345678"), "1234-5678");
        assert_eq!(dashed("2049363X"), "2049-363X");
    }
}
