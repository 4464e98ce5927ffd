use thiserror::Error;

/// Transport-level failures against the render queue. The worker loop
/// recovers from all of these by retrying on the next poll cycle.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
}
