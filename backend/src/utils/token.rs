//! Opaque API token generation.
//!
//! API token values are high-entropy random strings with a recognizable
//! `pm_` prefix. Only the truncated prefix is ever stored for display;
//! the full value is returned to the caller exactly once at creation.

use rand::RngCore;

/// Number of leading characters kept for display purposes.
const PREFIX_LEN: usize = 7;

/// Generates a new opaque API token value: `pm_` plus 56 hex characters.
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 28];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("pm_{}", hex::encode(bytes))
}

/// Truncated, display-only form of a token value.
pub fn token_prefix(token: &str) -> String {
    format!("{}...", &token[..PREFIX_LEN.min(token.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_api_token();
        assert!(token.starts_with("pm_"));
        assert_eq!(token.len(), 3 + 56);

        let prefix = token_prefix(&token);
        assert_eq!(prefix.len(), 10);
        assert!(prefix.ends_with("..."));
        assert!(token.starts_with(&prefix[..7]));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_api_token(), generate_api_token());
    }
}
