use serde::{Deserialize, Serialize};
use std::fmt;

/// Wrapper for secret strings (e.g. registry tokens) that prints a
/// "<REDACTED, length {length of the secret}>" string for Debug/Display,
/// so secrets never leak into logs or error chains.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        SecretString(s)
    }

    /// Access the raw secret if explicitly needed
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    fn fmt_redacted_secret(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<REDACTED, length {}>", self.0.len())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString::new(s)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_redacted_secret(f)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_redacted_secret(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_redact_the_secret() {
        let secret = SecretString::new("hunter2".to_string());
        assert_eq!(format!("{:?}", secret), "<REDACTED, length 7>");
        assert_eq!(secret.to_string(), "<REDACTED, length 7>");
    }

    #[test]
    fn expose_secret_returns_the_raw_value() {
        let secret = SecretString::from("hunter2".to_string());
        assert_eq!(secret.expose_secret(), "hunter2");
    }
}
