//! Access token storage using system keyring

use keyring::Entry;

use super::error::ApiError;

/// Service name for keyring storage
const SERVICE_NAME: &str = "syllabus-cli";
/// Entry name for the bearer token
const TOKEN_ENTRY: &str = "curriculum-access-token";

/// Manages the curriculum bearer token in the system keyring
pub struct TokenStore;

impl TokenStore {
    /// Get the token from system keyring
    pub fn get_token() -> Result<String, ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => ApiError::TokenNotFound,
            _ => ApiError::KeyringError(e.to_string()),
        })
    }

    /// Store the token in system keyring
    pub fn set_token(token: &str) -> Result<(), ApiError> {
        if !Self::validate_token_format(token) {
            return Err(ApiError::InvalidToken);
        }

        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.set_password(token).map_err(|e| ApiError::KeyringError(e.to_string()))
    }

    /// Delete the stored token
    pub fn delete_token() -> Result<(), ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.delete_credential().map_err(|e| match e {
            keyring::Error::NoEntry => ApiError::TokenNotFound,
            _ => ApiError::KeyringError(e.to_string()),
        })
    }

    /// Shape check only; the service decides whether a token is valid
    fn validate_token_format(token: &str) -> bool {
        token.len() >= 16 && !token.chars().any(char::is_whitespace)
    }

    /// Mask a token for display (show first 6 and last 4 chars)
    pub fn mask_token(token: &str) -> String {
        if token.len() <= 12 || !token.is_ascii() {
            return "*".repeat(token.chars().count());
        }
        let prefix = &token[..6];
        let suffix = &token[token.len() - 4..];
        format!("{}...{}", prefix, suffix)
    }
}
