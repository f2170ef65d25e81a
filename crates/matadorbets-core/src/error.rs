use thiserror::Error;

/// Failures of a conversation turn against the remote model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No API credential configured, or the session could not be created
    /// because of it.
    #[error("API_KEY_MISSING")]
    CredentialMissing,
    /// Any other transport or remote-side failure
    #[error("{0}")]
    RequestFailed(String),
}

impl SessionError {
    /// Whether the user should be shown the credential setup instructions
    /// instead of a generic error. The remote side reports rejected keys
    /// with an `API_KEY_*` reason, so those count as well.
    pub fn needs_setup(&self) -> bool {
        match self {
            SessionError::CredentialMissing => true,
            SessionError::RequestFailed(message) => message.contains("API_KEY"),
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::RequestFailed(err.to_string())
    }
}

/// Failures writing to or reading from the blob store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_setup_for_missing_and_rejected_keys() {
        assert!(SessionError::CredentialMissing.needs_setup());
        assert!(SessionError::RequestFailed(
            "Gemini API error 400: API key not valid (API_KEY_INVALID)".into()
        )
        .needs_setup());
        assert!(!SessionError::RequestFailed("connection reset".into()).needs_setup());
    }

    #[test]
    fn test_credential_missing_message_matches_marker() {
        assert_eq!(SessionError::CredentialMissing.to_string(), "API_KEY_MISSING");
    }
}
