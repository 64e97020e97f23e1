use crate::credentials::ResolveError;

/// Core error type for the relay.
///
/// Adapter crates map their specific errors into this type so the router can
/// contain per-update failures and the binary can treat startup failures as
/// fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
