use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds of a duplex run. Every variant is fatal to the current
/// run; none is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrong channel mode, mismatched rates or an unsupported memory map.
    #[error("configuration: {0}")]
    Config(String),

    /// A channel operation failed mid-loop.
    #[error("device: {0}")]
    Device(#[from] std::io::Error),

    /// The monotonic time source failed.
    #[error("clock: {0}")]
    Clock(String),
}
