//! Display-name normalization and validation for the registration handshake

use thiserror::Error;

/// Shortest accepted display name, after normalization.
pub const MIN_NAME_LEN: usize = 2;
/// Longest accepted display name, after normalization.
pub const MAX_NAME_LEN: usize = 10;

/// Reasons a requested display name is refused.
///
/// The `Display` text is sent verbatim to the client before it is asked again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Sorry, you must have letters or numbers in your name")]
    NoAlphanumeric,
    #[error("Sorry, your name must be 2 or more letters")]
    TooShort,
    #[error("Sorry, your name must be 10 or fewer letters")]
    TooLong,
    #[error("Sorry, that name is already being used")]
    Taken,
}

/// Trims the request and collapses every run of non-alphanumeric characters
/// into a single underscore. Applying it twice changes nothing.
pub fn normalize_name(requested: &str) -> String {
    let mut name = String::with_capacity(requested.len());
    let mut in_run = false;

    for c in requested.trim().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
            in_run = false;
        } else if !in_run {
            name.push('_');
            in_run = true;
        }
    }

    name
}

/// Normalizes a requested name and checks the shape rules.
///
/// Uniqueness is not checked here; only the registry knows which names are
/// live.
pub fn validate_name(requested: &str) -> Result<String, NameError> {
    let name = normalize_name(requested);

    if name.is_empty() || name == "_" {
        return Err(NameError::NoAlphanumeric);
    }
    if name.len() < MIN_NAME_LEN {
        return Err(NameError::TooShort);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_runs() {
        assert_eq!(normalize_name("!a!"), "_a_");
        assert_eq!(normalize_name("ann  marie"), "ann_marie");
        assert_eq!(normalize_name("a!?-b"), "a_b");
        assert_eq!(normalize_name("  bob \r"), "bob");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let requests = [
            "!a!", "alice", "  x y  z ", "é-clair", "__", "a__b", "!!!", "", "Ünïcode 42",
        ];
        for request in requests {
            let once = normalize_name(request);
            assert_eq!(normalize_name(&once), once, "request {:?}", request);
        }
    }

    #[test]
    fn test_symbols_only_is_rejected() {
        assert_eq!(validate_name("!!!"), Err(NameError::NoAlphanumeric));
        assert_eq!(validate_name(""), Err(NameError::NoAlphanumeric));
        assert_eq!(validate_name("   "), Err(NameError::NoAlphanumeric));
    }

    #[test]
    fn test_length_limits() {
        assert_eq!(validate_name("a"), Err(NameError::TooShort));
        assert_eq!(validate_name("ab"), Ok("ab".to_string()));
        assert_eq!(validate_name("abcdefghij"), Ok("abcdefghij".to_string()));
        assert_eq!(validate_name("abcdefghijk"), Err(NameError::TooLong));
    }

    #[test]
    fn test_wrapped_letter_is_accepted() {
        assert_eq!(validate_name("!a!"), Ok("_a_".to_string()));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            NameError::TooShort.to_string(),
            "Sorry, your name must be 2 or more letters"
        );
        assert_eq!(
            NameError::TooLong.to_string(),
            "Sorry, your name must be 10 or fewer letters"
        );
        assert_eq!(
            NameError::Taken.to_string(),
            "Sorry, that name is already being used"
        );
    }
}
