//! Error taxonomy shared by the credential store and the video operations.

use std::path::PathBuf;

/// Every failure this crate surfaces to its caller.
///
/// Remote failures are not differentiated by error code: the service's message is carried
/// verbatim in [`Error::Upload`], [`Error::Api`], or [`Error::RefreshExchange`]. Nothing is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OAuth client is not configured well enough to talk to Google.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file handed to an upload does not exist (or is not a regular file).
    #[error(
        "file does not exist at path \"{}\"; provide a full path to the file before attempting to upload",
        .0.display()
    )]
    FileNotFound(PathBuf),

    /// No access token has ever been stored for the account.
    #[error("an access token is required for account \"{0}\"")]
    MissingCredential(String),

    /// The stored access token has expired and carries no refresh token.
    #[error("the access token for account \"{0}\" has expired and cannot be refreshed")]
    ExpiredCredential(String),

    /// Exchanging a refresh token (or an authorization code) with Google failed.
    #[error("OAuth token exchange failed: {0}")]
    RefreshExchange(String),

    /// A resumable upload was rejected or interrupted.
    #[error("upload failed: {0}")]
    Upload(String),

    /// A non-upload API call was rejected.
    #[error("YouTube API request failed: {0}")]
    Api(String),

    /// The video targeted by a delete does not exist.
    #[error("a video matching id \"{0}\" could not be found")]
    NotFound(String),

    #[error("token storage")]
    Storage(#[from] sqlx::Error),

    #[error("malformed access token bundle")]
    Bundle(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
