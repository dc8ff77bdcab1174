//! Upload videos to YouTube on behalf of users whose OAuth tokens are kept in SQLite.
//!
//! [`YouTube`] is the entry point: it resolves a valid access token for an account through
//! [`CredentialManager`] (refreshing and re-saving it when it has expired) and then drives
//! the YouTube Data API through a [`VideoService`].

pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod store;
pub mod token;
pub mod uploader;
pub mod youtube_api;

pub use config::Config;
pub use credentials::CredentialManager;
pub use error::{Error, Result};
pub use oauth::{OAuthManager, TokenRefresher};
pub use store::{SqliteTokenStore, TokenStore};
pub use token::AccessTokenBundle;
pub use uploader::{UploadedVideo, VideoMetadata, YouTube};
pub use youtube_api::{PrivacyStatus, VideoService, YouTubeClient};
