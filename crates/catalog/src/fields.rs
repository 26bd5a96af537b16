//! Field normalisation shared by the catalog records.

use stockledger_core::{DomainError, DomainResult};

/// Trim `value` and require it to be non-empty and at most `max` characters.
pub fn required(field: &'static str, value: &str, max: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "cannot be empty"));
    }
    if trimmed.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Like [`required`], but blank input maps to `None`.
pub fn optional(field: &'static str, value: Option<&str>, max: usize) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max).map(Some),
    }
}

/// Codes compare case-insensitively, the way the lookup indexes them.
pub fn code_key(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Case-insensitive substring match used by product search.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Laptop ", 10).unwrap(), "Laptop");
        assert!(matches!(
            required("name", "   ", 10),
            Err(DomainError::Validation { field: "name", .. })
        ));
    }

    #[test]
    fn required_counts_characters_not_bytes() {
        assert!(required("name", "ééééé", 5).is_ok());
        assert!(required("name", "éééééé", 5).is_err());
    }

    #[test]
    fn optional_maps_blank_to_none() {
        assert_eq!(optional("address", Some("  "), 10).unwrap(), None);
        assert_eq!(optional("address", None, 10).unwrap(), None);
        assert_eq!(optional("address", Some(" Main St "), 10).unwrap().as_deref(), Some("Main St"));
    }
}
