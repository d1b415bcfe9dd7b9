//! Request DTOs for the key-value service API
//!
//! Parameters arrive as query strings or urlencoded form bodies. Every field
//! is optional at the serde level so a missing parameter becomes a 400 with
//! a JSON error body rather than an extractor rejection.

use serde::Deserialize;

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{Result, ServiceError};

/// Parameters of `POST /create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyValueParams {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl KeyValueParams {
    /// Fills fields missing here from `other`.
    pub fn or(self, other: KeyValueParams) -> Self {
        Self {
            key: self.key.or(other.key),
            value: self.value.or(other.value),
        }
    }

    /// Returns the validated key and value.
    ///
    /// An empty value is allowed; an empty key is not.
    pub fn validate(self) -> Result<(String, String)> {
        let (Some(key), Some(value)) = (self.key, self.value) else {
            return Err(ServiceError::InvalidRequest("Missing key or value".to_string()));
        };
        check_key(&key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(ServiceError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }
        Ok((key, value))
    }
}

/// Parameters of `GET /read` and `DELETE /delete`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyParams {
    #[serde(default)]
    pub key: Option<String>,
}

impl KeyParams {
    pub fn validate(self) -> Result<String> {
        let Some(key) = self.key else {
            return Err(ServiceError::InvalidRequest("Missing key".to_string()));
        };
        check_key(&key)?;
        Ok(key)
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ServiceError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ServiceError::InvalidRequest(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
