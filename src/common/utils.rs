//! Utility functions for rwcache

/// Longest key memcached accepts
pub const MAX_KEY_LEN: usize = 250;

/// Validate key (non-empty, at most 250 bytes, no spaces or control chars)
pub fn validate_key(key: &str) -> crate::Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(crate::Error::MalformedKey(key.to_string()));
    }

    if key.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(crate::Error::MalformedKey(key.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("normal-key").is_ok());
        assert!(validate_key("path/to/key").is_ok());
        assert!(validate_key(&"x".repeat(MAX_KEY_LEN)).is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(&"x".repeat(MAX_KEY_LEN + 1)).is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key("tab\tkey").is_err());
        assert!(validate_key("del\x7f").is_err());
    }
}
