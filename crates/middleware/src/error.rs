use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("subscription closed: {0}")]
    Closed(String),
}

impl TransportError {
    /// Whether the subscription behind this error can no longer deliver messages
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_is_terminal() {
        assert!(TransportError::Closed("eof".into()).is_closed());
        assert!(!TransportError::SubscribeFailed("lagged".into()).is_closed());
        assert!(!TransportError::PublishFailed("no responders".into()).is_closed());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::PublishFailed("no responders".into());
        assert_eq!(err.to_string(), "publish failed: no responders");
    }
}
