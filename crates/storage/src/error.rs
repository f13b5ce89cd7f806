/// All errors that can be returned by a hosted-backend implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested row does not exist (e.g. unknown catalog item).
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// The backend refused the request on business grounds (out of stock,
    /// item unpublished, duplicate purchase, ...). The message is the
    /// backend's own explanation and is safe to show to the user.
    #[error("request rejected: {message}")]
    Rejected { message: String },

    /// The request never produced a usable response (DNS, TLS, timeout,
    /// non-success HTTP status).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The response arrived but could not be decoded into a record.
    #[error("could not decode {what}: {message}")]
    Decode { what: String, message: String },

    /// Any other backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport { .. } | StoreError::Backend(_))
    }
}
