// =============================================================================
// Shared Input Validation
// =============================================================================
//
// Symbol normalization and batch parsing, shared by every HTTP-facing query
// contract. Symbols are uppercase, may start with `^` (indices), and run
// 1-20 characters of `[A-Z0-9.-]` after the first character.
// =============================================================================

use regex::Regex;
use std::sync::OnceLock;

fn symbol_re() -> &'static Regex {
    static SYMBOL_RE: OnceLock<Regex> = OnceLock::new();
    SYMBOL_RE.get_or_init(|| {
        Regex::new(r"^[\^A-Z][A-Z0-9.\-]{0,19}$").expect("static regex is valid")
    })
}

/// Raised when client-provided input fails validation. Surfaced as HTTP 400
/// by the API layer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Trim, uppercase, and validate a single symbol.
pub fn normalize_symbol(raw: &str) -> Result<String, ValidationError> {
    let candidate = raw.trim().to_uppercase();
    if candidate.is_empty() || !symbol_re().is_match(&candidate) {
        return Err(ValidationError(format!("invalid symbol: {raw:?}")));
    }
    Ok(candidate)
}

/// Normalize and de-duplicate a batch of symbols, preserving first-appearance
/// order. Requires at least one valid symbol.
pub fn normalize_symbols<I, S>(symbols: I) -> Result<Vec<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut normalized = Vec::new();
    for raw in symbols {
        let cleaned = normalize_symbol(raw.as_ref())?;
        if seen.insert(cleaned.clone()) {
            normalized.push(cleaned);
        }
    }
    if normalized.is_empty() {
        return Err(ValidationError(
            "at least one valid symbol is required".to_string(),
        ));
    }
    Ok(normalized)
}

/// Split a comma-separated string into a normalized, validated symbol list.
/// Empty entries (e.g. from `"aapl,,msft"`) are dropped before validation.
pub fn parse_symbols_csv(csv: &str) -> Result<Vec<String>, ValidationError> {
    let parts: Vec<&str> = csv.split(',').filter(|s| !s.trim().is_empty()).collect();
    normalize_symbols(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_lowercase_symbol() {
        assert_eq!(normalize_symbol("aapl").unwrap(), "AAPL");
    }

    #[test]
    fn accepts_index_prefix() {
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
    }

    #[test]
    fn rejects_empty_symbol() {
        assert!(normalize_symbol("").is_err());
    }

    #[test]
    fn rejects_too_long_symbol() {
        assert!(normalize_symbol("TOO_LONG_TICKER_SYM").is_err());
    }

    #[test]
    fn rejects_symbol_with_illegal_chars() {
        assert!(normalize_symbol("AAPL;DROP").is_err());
    }

    #[test]
    fn normalize_symbol_is_idempotent() {
        let once = normalize_symbol("aapl").unwrap();
        let twice = normalize_symbol(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn dedups_preserving_first_appearance_order() {
        let out = normalize_symbols(["msft", "AAPL", "msft", "googl"]).unwrap();
        assert_eq!(out, vec!["MSFT", "AAPL", "GOOGL"]);
    }

    #[test]
    fn csv_parses_and_drops_empties() {
        let out = parse_symbols_csv("aapl, msft, , BRK.B").unwrap();
        assert_eq!(out, vec!["AAPL", "MSFT", "BRK.B"]);
    }

    #[test]
    fn csv_empty_string_is_an_error() {
        assert!(parse_symbols_csv("").is_err());
    }
}
