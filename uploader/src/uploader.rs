//! The video operations: upload, thumbnail, existence check, and delete.

use crate::config::Config;
use crate::credentials::CredentialManager;
use crate::error::{Error, Result};
use crate::oauth::{OAuthManager, TokenRefresher};
use crate::store::{SqliteTokenStore, TokenStore};
use crate::youtube_api::{
    CHUNK_SIZE, ChunkStatus, PrivacyStatus, ThumbnailSetResponse, UploadSession, Video,
    VideoService, VideoSnippet, VideoStatus, YouTubeClient,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::instrument;

/// Caller-supplied description of a video to upload.
///
/// Each field is applied only if present; YouTube fills in defaults for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl VideoMetadata {
    fn to_snippet(&self) -> VideoSnippet {
        VideoSnippet {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            category_id: self.category_id.clone(),
            ..Default::default()
        }
    }
}

/// A video whose bytes YouTube has fully acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedVideo {
    video_id: String,
    snippet: VideoSnippet,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<String>,
}

impl UploadedVideo {
    /// The ID YouTube assigned to the video.
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// The snippet as YouTube returned it, which may differ from what was sent.
    pub fn snippet(&self) -> &VideoSnippet {
        &self.snippet
    }

    /// Set once a custom thumbnail has been uploaded with [`YouTube::with_thumbnail`].
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
}

/// Uploads, checks, and deletes YouTube videos on behalf of stored accounts.
///
/// Every remote operation first obtains a valid token for the given account through the
/// [`CredentialManager`], then talks to YouTube one request at a time.
#[derive(Debug)]
pub struct YouTube<S = SqliteTokenStore, R = OAuthManager, V = YouTubeClient> {
    credentials: CredentialManager<S, R>,
    api: V,
}

impl YouTube {
    /// Wires the production stack: SQLite token storage, Google OAuth, and the HTTPS client.
    ///
    /// Fails with [`Error::Configuration`] before touching the database if the OAuth client
    /// is not configured.
    pub async fn connect(config: &Config) -> Result<Self> {
        let oauth = OAuthManager::new(config)?;
        let store = SqliteTokenStore::connect(&config.database_url).await?;
        Ok(Self::new(
            CredentialManager::new(store, oauth),
            YouTubeClient::new()?,
        ))
    }
}

impl<S, R, V> YouTube<S, R, V>
where
    S: TokenStore,
    R: TokenRefresher,
    V: VideoService,
{
    pub fn new(credentials: CredentialManager<S, R>, api: V) -> Self {
        Self { credentials, api }
    }

    pub fn credentials(&self) -> &CredentialManager<S, R> {
        &self.credentials
    }

    pub fn api(&self) -> &V {
        &self.api
    }

    pub async fn has_token(&self, account: &str) -> Result<bool> {
        self.credentials.has_token(account).await
    }

    /// See [`CredentialManager::has_refresh_token`].
    pub async fn has_refresh_token(&self, account: &str) -> Result<bool> {
        self.credentials.has_refresh_token(account).await
    }

    /// See [`CredentialManager::is_access_token_expired`].
    pub async fn is_access_token_expired(&self, account: &str) -> Result<bool> {
        self.credentials.is_access_token_expired(account).await
    }

    /// Uploads the video at `path` to the channel of `account`.
    ///
    /// The file is opened and its first chunk read before any token lookup or remote call,
    /// so an unreadable file fails with [`Error::FileNotFound`] without side effects. It is
    /// then sent in [`CHUNK_SIZE`] pieces through a resumable upload session, one at a time.
    /// A failed chunk aborts the whole upload; the bytes already sent are abandoned and a
    /// later call starts over.
    #[instrument(skip(self, path, metadata), fields(path = %path.as_ref().display()))]
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
        metadata: &VideoMetadata,
        privacy: PrivacyStatus,
        account: &str,
    ) -> Result<UploadedVideo> {
        let media = LocalMedia::open(path.as_ref()).await?;
        let token = self.credentials.ensure_valid_token(account).await?;

        let video = Video {
            id: None,
            snippet: Some(metadata.to_snippet()),
            status: Some(VideoStatus {
                privacy_status: Some(privacy),
                upload_status: None,
            }),
        };

        let total_len = media.len;
        let session = self
            .api
            .start_video_upload(&token.access_token, &video, total_len)
            .await?;
        let body = self.send_file(&session, media).await?;

        let uploaded: Video = serde_json::from_value(body)
            .map_err(|e| Error::Upload(format!("unexpected videos.insert response: {e}")))?;
        let video_id = uploaded.id.ok_or_else(|| {
            Error::Upload("videos.insert response carries no video id".to_string())
        })?;

        tracing::info!(video_id, total_len, "uploaded video");
        Ok(UploadedVideo {
            video_id,
            snippet: uploaded.snippet.unwrap_or_default(),
            thumbnail_url: None,
        })
    }

    /// Sets the PNG at `image_path` as the custom thumbnail of a video uploaded with
    /// [`Self::upload`], returning the video with its thumbnail URL filled in.
    #[instrument(skip(self, video, image_path), fields(video_id = video.video_id()))]
    pub async fn with_thumbnail(
        &self,
        video: UploadedVideo,
        image_path: impl AsRef<Path>,
        account: &str,
    ) -> Result<UploadedVideo> {
        let media = LocalMedia::open(image_path.as_ref()).await?;
        let token = self.credentials.ensure_valid_token(account).await?;

        let session = self
            .api
            .start_thumbnail_upload(&token.access_token, &video.video_id, media.len)
            .await?;
        let body = self.send_file(&session, media).await?;

        let response: ThumbnailSetResponse = serde_json::from_value(body)
            .map_err(|e| Error::Upload(format!("unexpected thumbnails.set response: {e}")))?;
        let thumbnail_url = response.default_url().map(str::to_string);
        if thumbnail_url.is_none() {
            tracing::warn!("thumbnails.set response lists no default thumbnail");
        }

        Ok(UploadedVideo {
            thumbnail_url,
            ..video
        })
    }

    /// Whether YouTube knows a video with this id.
    #[instrument(skip(self))]
    pub async fn exists(&self, id: &str, account: &str) -> Result<bool> {
        let token = self.credentials.ensure_valid_token(account).await?;
        let listing = self
            .api
            .list_videos(&token.access_token, id, "status")
            .await?;
        Ok(!listing.items.is_empty())
    }

    /// Deletes the video with this id.
    ///
    /// Fails with [`Error::NotFound`], without issuing a delete, if the video does not exist.
    /// Success means YouTube accepted the request, not that the video is already gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str, account: &str) -> Result<()> {
        let token = self.credentials.ensure_valid_token(account).await?;

        if !self.exists(id, account).await? {
            return Err(Error::NotFound(id.to_string()));
        }

        self.api.delete_video(&token.access_token, id).await?;
        tracing::info!(video_id = id, "deleted video");
        Ok(())
    }

    /// Streams `media` through `session` and returns the completion body.
    async fn send_file(
        &self,
        session: &UploadSession,
        mut media: LocalMedia,
    ) -> Result<serde_json::Value> {
        let total_len = media.len;
        let mut offset = 0u64;
        let mut chunk = std::mem::take(&mut media.first_chunk);

        loop {
            let len = chunk.len() as u64;
            if len == 0 && offset < total_len {
                return Err(Error::Upload(format!(
                    "{} ended after {offset} of {total_len} bytes",
                    media.path.display()
                )));
            }

            match self
                .api
                .upload_chunk(session, Bytes::from(chunk), offset, total_len)
                .await?
            {
                ChunkStatus::Complete(body) => return Ok(body),
                ChunkStatus::Incomplete { received } => {
                    offset += len;
                    if let Some(received) = received.filter(|&r| r != offset) {
                        tracing::warn!(
                            received,
                            sent = offset,
                            "service holds fewer bytes than sent"
                        );
                    }
                    if offset >= total_len {
                        return Err(Error::Upload(format!(
                            "all {total_len} bytes sent but the upload was not completed"
                        )));
                    }
                    chunk = media.read_chunk(offset).await?;
                }
            }
        }
    }
}

/// A local file that has been opened, sized and had its first chunk read.
#[derive(Debug)]
struct LocalMedia {
    path: PathBuf,
    file: tokio::fs::File,
    len: u64,
    first_chunk: Vec<u8>,
}

impl LocalMedia {
    /// Fails with [`Error::FileNotFound`] unless `path` is a regular file that can be read.
    async fn open(path: &Path) -> Result<Self> {
        let not_found = || Error::FileNotFound(path.to_path_buf());
        let file = tokio::fs::File::open(path).await.map_err(|_| not_found())?;
        let metadata = file.metadata().await.map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        let mut media = Self {
            path: path.to_path_buf(),
            file,
            len: metadata.len(),
            first_chunk: Vec::new(),
        };
        let unreadable = |e: std::io::Error| {
            tracing::debug!(%e, path = %path.display(), "file cannot be read");
            not_found()
        };
        if media.len == 0 {
            // an empty read proves nothing; some special files report no length
            let mut byte = [0u8; 1];
            let read = media.file.read(&mut byte).await.map_err(unreadable)?;
            tracing::trace!(read, "checked zero-length file is readable");
            media.file.rewind().await.map_err(unreadable)?;
        }
        media.first_chunk = media.read_chunk(0).await.map_err(unreadable)?;
        Ok(media)
    }

    /// Reads the next chunk, never past the length the file had when it was opened.
    async fn read_chunk(&mut self, offset: u64) -> std::io::Result<Vec<u8>> {
        let limit = (CHUNK_SIZE as u64).min(self.len.saturating_sub(offset));
        let mut chunk = Vec::with_capacity(limit as usize);
        (&mut self.file).take(limit).read_to_end(&mut chunk).await?;
        Ok(chunk)
    }
}
