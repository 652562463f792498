// Error types for talking to a GradeSpeed portal
use thiserror::Error;

// Failure of the HTTP collaborator itself.
#[derive(Error, Debug)]
pub enum TransportError {
    // HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    // The server answered, but not with a success status
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

// Main error type for portal sessions and parsing
#[derive(Error, Debug)]
pub enum Error {
    // Network or IO failure; never retried here
    #[error(transparent)]
    Transport(#[from] TransportError),

    // The page failed the district's validity check: expired session, bad
    // credentials, a maintenance page or markup drift
    #[error("portal returned an invalid page for {url}; log in again")]
    InvalidSessionOutput { url: String },

    // The page passed validation but an expected element was missing
    #[error("malformed page: {0}")]
    MalformedPage(String),

    // The caller used the session out of order
    #[error("caller contract violation: {0}")]
    CallerContract(String),
}

// Type alias for Results using Error
pub type Result<T> = std::result::Result<T, Error>;
