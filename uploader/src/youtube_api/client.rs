//! Core YouTube API client functionality.

use crate::error::{Error, Result};
use crate::youtube_api::VideoService;
use crate::youtube_api::upload::{ChunkStatus, UploadSession, content_range, received_bytes};
use crate::youtube_api::videos::{Video, VideoListResponse};
use bytes::Bytes;
use eyre::Context;
use http::{Method, StatusCode, header};
use serde::Serialize;
use tracing::instrument;

const API_BASE_URL: &str = "https://www.googleapis.com";

const VIDEOS_PATH: &str = "/youtube/v3/videos";
const VIDEOS_UPLOAD_PATH: &str = "/upload/youtube/v3/videos";
const THUMBNAILS_UPLOAD_PATH: &str = "/upload/youtube/v3/thumbnails/set";

/// Client for interacting with the YouTube Data API v3.
///
/// The client holds no credentials of its own: every call takes the access token to present,
/// which the caller obtains from [`crate::CredentialManager::ensure_valid_token`].
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Scheme and host every API path is appended to
    base_url: String,
}

impl YouTubeClient {
    /// Creates a new YouTube API client with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            // a 308 from an upload session means "resume incomplete", not "follow me"
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Configuration(format!("build YouTube HTTP client: {e}")))?;
        Ok(Self::with_http_client(client))
    }

    /// Creates a client on top of an existing HTTP client.
    ///
    /// The client must not follow redirects, or resumable uploads will misbehave.
    pub fn with_http_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Sends every request to `base_url` instead of `https://www.googleapis.com`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Makes an authenticated HTTP request to the YouTube API with common error handling.
    ///
    /// This method consolidates the shared logic across all YouTube API requests:
    /// - Authorization header setup
    /// - Query parameters and extra headers
    /// - JSON body (for requests that need a body)
    /// - Status code validation and error handling
    ///
    /// # Returns
    ///
    /// The raw [`reqwest::Response`] for method-specific parsing.
    #[instrument(skip(self, access_token, json_body), level = tracing::Level::TRACE)]
    async fn make_authenticated_request(
        &self,
        access_token: &str,
        method: Method,
        url: &str,
        query_params: &[(&str, &str)],
        headers: &[(&str, String)],
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .query(query_params);

        for (name, value) in headers {
            request = request.header(*name, value);
        }

        // Add JSON body and content-type if provided
        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send {method} request to YouTube API: {url}"))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!(
                "YouTube API {} request failed with status {}: {}",
                method,
                status_code,
                error_text
            );
        }

        Ok(response)
    }

    /// Starts a resumable upload session and returns its URI from the `Location` header.
    async fn start_resumable_upload(
        &self,
        access_token: &str,
        url: &str,
        query_params: &[(&str, &str)],
        content_type: &'static str,
        total_len: u64,
        metadata: Option<&impl Serialize>,
    ) -> eyre::Result<UploadSession> {
        let headers = [
            ("X-Upload-Content-Type", content_type.to_string()),
            ("X-Upload-Content-Length", total_len.to_string()),
        ];
        let response = self
            .make_authenticated_request(
                access_token,
                Method::POST,
                url,
                query_params,
                &headers,
                metadata,
            )
            .await?;

        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| eyre::eyre!("no upload session URL in response"))?
            .to_string();

        tracing::debug!(total_len, content_type, "resumable upload session started");

        Ok(UploadSession {
            url: session_url,
            content_type,
            access_token: access_token.to_string(),
        })
    }

    async fn put_chunk(
        &self,
        session: &UploadSession,
        chunk: Bytes,
        offset: u64,
        total_len: u64,
    ) -> eyre::Result<ChunkStatus> {
        let len = chunk.len() as u64;
        let range = content_range(offset, len, total_len);
        tracing::debug!(%range, "uploading chunk");

        let response = self
            .client
            .put(&session.url)
            .bearer_auth(&session.access_token)
            .header(header::CONTENT_TYPE, session.content_type)
            .header(header::CONTENT_RANGE, &range)
            .body(chunk)
            .send()
            .await
            .with_context(|| format!("send chunk {range}"))?;

        let status = response.status();
        if status == StatusCode::PERMANENT_REDIRECT {
            let received = response
                .headers()
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(received_bytes);
            tracing::trace!(?received, "chunk acknowledged, upload incomplete");
            return Ok(ChunkStatus::Incomplete { received });
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!("chunk {range} rejected with status {status}: {error_text}");
        }

        let body = response
            .json()
            .await
            .context("parse completed upload response as JSON")?;
        Ok(ChunkStatus::Complete(body))
    }
}

impl VideoService for YouTubeClient {
    /// Uses `videos.insert` with `uploadType=resumable`.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/insert>
    #[instrument(skip(self, access_token, video))]
    async fn start_video_upload(
        &self,
        access_token: &str,
        video: &Video,
        total_len: u64,
    ) -> Result<UploadSession> {
        self.start_resumable_upload(
            access_token,
            &self.url(VIDEOS_UPLOAD_PATH),
            &[("uploadType", "resumable"), ("part", "status,snippet")],
            "video/*",
            total_len,
            Some(video),
        )
        .await
        .map_err(|e| Error::Upload(format!("{e:#}")))
    }

    /// Uses `thumbnails.set` with `uploadType=resumable`.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/thumbnails/set>
    #[instrument(skip(self, access_token))]
    async fn start_thumbnail_upload(
        &self,
        access_token: &str,
        video_id: &str,
        total_len: u64,
    ) -> Result<UploadSession> {
        self.start_resumable_upload(
            access_token,
            &self.url(THUMBNAILS_UPLOAD_PATH),
            &[("uploadType", "resumable"), ("videoId", video_id)],
            "image/png",
            total_len,
            None::<&()>,
        )
        .await
        .map_err(|e| Error::Upload(format!("{e:#}")))
    }

    async fn upload_chunk(
        &self,
        session: &UploadSession,
        chunk: Bytes,
        offset: u64,
        total_len: u64,
    ) -> Result<ChunkStatus> {
        self.put_chunk(session, chunk, offset, total_len)
            .await
            .map_err(|e| Error::Upload(format!("{e:#}")))
    }

    /// Uses `videos.list` filtered by `id`.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self, access_token))]
    async fn list_videos(
        &self,
        access_token: &str,
        id: &str,
        part: &str,
    ) -> Result<VideoListResponse> {
        let result: eyre::Result<VideoListResponse> = async {
            let response = self
                .make_authenticated_request(
                    access_token,
                    Method::GET,
                    &self.url(VIDEOS_PATH),
                    &[("part", part), ("id", id)],
                    &[],
                    None::<&()>,
                )
                .await?;
            response
                .json()
                .await
                .context("parse YouTube videos API response as JSON")
        }
        .await;

        let videos = result.map_err(|e| Error::Api(format!("{e:#}")))?;
        tracing::debug!(
            video_id = id,
            returned_items = videos.items.len(),
            "fetched videos"
        );
        Ok(videos)
    }

    /// Uses `videos.delete`.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/delete>
    #[instrument(skip(self, access_token))]
    async fn delete_video(&self, access_token: &str, id: &str) -> Result<()> {
        self.make_authenticated_request(
            access_token,
            Method::DELETE,
            &self.url(VIDEOS_PATH),
            &[("id", id)],
            &[],
            None::<&()>,
        )
        .await
        .map_err(|e| Error::Api(format!("{e:#}")))?;

        tracing::debug!(video_id = id, "deleted video");
        Ok(())
    }
}
