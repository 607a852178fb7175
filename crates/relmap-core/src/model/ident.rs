use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RelmapError, Result};

static SEG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Very simple identifier guard: letters, digits, underscore only.
/// Dotted paths (`schema.table`) are accepted segment by segment.
pub fn validate_ident(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(RelmapError::integrity("invalid identifier: empty"));
    }
    for part in path.split('.') {
        if part.is_empty() {
            return Err(RelmapError::integrity(format!(
                "invalid identifier: empty segment in `{path}`"
            )));
        }
        if !SEG.is_match(part) {
            return Err(RelmapError::integrity(format!(
                "invalid identifier segment `{part}` in `{path}`"
            )));
        }
    }
    Ok(())
}

/// Whether a single segment is a plain identifier.
pub fn is_ident_segment(s: &str) -> bool {
    SEG.is_match(s)
}

/// SQL column names compare case-insensitively.
pub fn same_column(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ident() {
        assert!(validate_ident("orders").is_ok());
        assert!(validate_ident("sales.orders").is_ok());
        assert!(validate_ident("_tmp1").is_ok());
        assert!(validate_ident("").is_err());
        assert!(validate_ident("sales..orders").is_err());
        assert!(validate_ident("1orders").is_err());
        assert!(validate_ident("orders;drop").is_err());
    }

    #[test]
    fn test_is_ident_segment() {
        assert!(is_ident_segment("loyaltyTier"));
        assert!(is_ident_segment("_tmp1"));
        assert!(!is_ident_segment("sales.orders"));
        assert!(!is_ident_segment("line items"));
        assert!(!is_ident_segment("{element}"));
        assert!(!is_ident_segment(""));
    }

    #[test]
    fn test_same_column() {
        assert!(same_column("ID", "id"));
        assert!(!same_column("id", "ids"));
    }
}
