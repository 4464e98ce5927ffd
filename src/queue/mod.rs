pub mod client;
pub mod error;
pub mod types;

pub use client::QueueClient;
pub use error::QueueError;
pub use types::{CompleteRequest, PendingRender, StemUpload};
