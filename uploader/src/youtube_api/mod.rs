//! YouTube Data API v3 client library.
//!
//! Only the slice of the API needed to manage uploaded videos is modelled here:
//!
//! - `videos.insert` and `thumbnails.set`, both through the resumable upload protocol
//!   (see [`upload`])
//! - `videos.list` by id
//! - `videos.delete`
//!
//! [`VideoService`] is the seam between the video operations and the network;
//! [`YouTubeClient`] implements it over HTTPS.

pub mod client;
pub mod types;
pub mod upload;
pub mod videos;

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;

// Re-export main types for convenience
pub use client::YouTubeClient;
pub use types::{PageInfo, Thumbnail, ThumbnailDetails};
pub use upload::{CHUNK_SIZE, ChunkStatus, UploadSession};
pub use videos::{
    PrivacyStatus, ThumbnailSetResponse, Video, VideoListResponse, VideoSnippet, VideoStatus,
};

/// The remote operations the video façade relies on.
///
/// Every method takes the bearer token to present; obtaining a valid one is the caller's job.
/// Upload-related failures are reported as [`crate::Error::Upload`], all others as
/// [`crate::Error::Api`], carrying the service's message.
pub trait VideoService {
    /// Opens a resumable `videos.insert` session for `total_len` bytes of video.
    fn start_video_upload(
        &self,
        access_token: &str,
        video: &Video,
        total_len: u64,
    ) -> impl Future<Output = Result<UploadSession>> + Send;

    /// Opens a resumable `thumbnails.set` session for `total_len` bytes of PNG.
    fn start_thumbnail_upload(
        &self,
        access_token: &str,
        video_id: &str,
        total_len: u64,
    ) -> impl Future<Output = Result<UploadSession>> + Send;

    /// Submits the bytes at `offset` of a `total_len`-byte upload.
    fn upload_chunk(
        &self,
        session: &UploadSession,
        chunk: Bytes,
        offset: u64,
        total_len: u64,
    ) -> impl Future<Output = Result<ChunkStatus>> + Send;

    /// Lists the video with the given `id`, returning only the requested `part`s.
    fn list_videos(
        &self,
        access_token: &str,
        id: &str,
        part: &str,
    ) -> impl Future<Output = Result<VideoListResponse>> + Send;

    fn delete_video(&self, access_token: &str, id: &str) -> impl Future<Output = Result<()>> + Send;
}
