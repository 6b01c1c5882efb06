//! Namespace name rules.
//!
//! A namespace is a bare string. Names travel into file paths and keys of
//! arbitrary backends, so the shape check rejects anything that cannot be
//! represented safely everywhere.

use crate::error::{MetaStoreError, Result};

const MAX_NAME_LEN: usize = 255;

/// Shape check for namespace names: non-empty, bounded, no control
/// characters, no path separators and not a relative path component.
pub fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c.is_control() || c == '/' || c == '\\')
}

/// Like [`is_valid_name`], but as a `Result` for use with `?`.
pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MetaStoreError::InvalidName(format!("{:?}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_names() {
        assert!(is_valid_name("pentaho"));
        assert!(is_valid_name("Data Services"));
        assert!(is_valid_name("ns-1.2_x"));
    }

    #[test]
    fn test_rejects_unsafe_names() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("   "));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\\b"));
        assert!(!is_valid_name("tab\there"));
        assert!(!is_valid_name(&"x".repeat(300)));
    }

    #[test]
    fn test_validate_name_reports_invalid_name() {
        match validate_name("a/b") {
            Err(MetaStoreError::InvalidName(msg)) => assert!(msg.contains("a/b")),
            other => panic!("Expected InvalidName, got {:?}", other),
        }
    }
}
