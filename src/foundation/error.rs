/// Convenience result type used throughout the crate.
pub type ReframeResult<T> = Result<T, ReframeError>;

#[derive(thiserror::Error, Debug)]
pub enum ReframeError {
    /// Setup-time failure: bad crop, missing track, unreadable source, size mismatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The decoder could not produce a frame: truncated output or a failed decoder process.
    #[error("decode error: {0}")]
    Decode(String),

    /// The encoder rejected a frame or failed to finalize the output.
    #[error("encode error: {0}")]
    Encode(String),

    /// A job is already in flight on this controller.
    #[error("busy: {0}")]
    Busy(String),

    /// Any other error, usually I/O with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReframeError {
    /// Build a [`ReframeError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`ReframeError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`ReframeError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ReframeError::Busy`].
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
