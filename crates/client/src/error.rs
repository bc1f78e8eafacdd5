use thiserror::Error;

/// Every way a backend call can fail.
///
/// `Network` covers everything that kept a usable response from arriving
/// (timeouts, refused connections, dropped bodies). `Backend` means the
/// backend answered but the answer cannot be used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, ClientError::Backend(_))
    }

    /// Short reason without the category prefix, for status lines.
    pub fn reason(&self) -> &str {
        match self {
            ClientError::Network(m) | ClientError::Backend(m) => m,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Network("request timed out".to_string())
        } else if err.is_decode() || err.is_status() || err.is_builder() {
            ClientError::Backend(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Backend(format!("invalid payload: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_is_a_backend_error() {
        let err: ClientError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(ClientError::from)
            .unwrap_err();
        assert!(err.is_backend());
        assert!(err.reason().starts_with("invalid payload"));
    }

    #[test]
    fn display_keeps_the_category() {
        let e = ClientError::Network("connection refused".into());
        assert_eq!(e.to_string(), "network error: connection refused");
        assert_eq!(e.reason(), "connection refused");
    }
}
