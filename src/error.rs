use thiserror::Error;

/// Network or HTTP level failure talking to the RAG server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{detail} ({status})")]
    Status {
        status: reqwest::StatusCode,
        detail: String,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server rejected request: {0}")]
    Rejected(String),
    #[error("cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Short description for status lines, without the status code noise.
    pub fn detail(&self) -> String {
        match self {
            TransportError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = TransportError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            detail: "Unsupported file type".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported file type (400 Bad Request)");
        assert_eq!(err.detail(), "Unsupported file type");
    }

    #[test]
    fn test_rejected_display() {
        let err = TransportError::Rejected("status was \"error\"".to_string());
        assert_eq!(err.detail(), "server rejected request: status was \"error\"");
    }
}
