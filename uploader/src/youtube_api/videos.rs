//! YouTube Videos API types.

use crate::youtube_api::types::{PageInfo, ThumbnailDetails};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Response structure for the `videos.list` API call.
///
/// Contains a list of [`Video`] resources that match the request criteria,
/// along with pagination information in [`PageInfo`].
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#videoListResponse`.
    #[serde(default)]
    pub kind: String,
    /// A list of videos that match the request criteria.
    #[serde(default)]
    pub items: VecDeque<Video>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next
    /// page in the result set.
    #[serde(rename = "nextPageToken", default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A `video` resource represents a YouTube video.
///
/// The same type is used as the request body of `videos.insert` (where `id` is absent) and
/// as the resource the API returns. Which parts are present depends on the `part` parameter
/// of the request.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Basic details about the video, such as its title, description, and category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    /// The video's uploading, processing, and privacy statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
}

/// The snippet object contains basic details about the video.
///
/// On upload only `title`, `description`, `tags`, and `category_id` are meaningful; the
/// service fills in the rest (and may normalize what it was given).
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keyword tags, in the order they were given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// The YouTube video category.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videoCategories/list>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    /// The date and time that the video was published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<ThumbnailDetails>,
}

/// The status object contains information about the video's uploading, processing, and
/// privacy statuses.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_status: Option<PrivacyStatus>,
    /// `uploaded`, `processed`, `failed`, `rejected`, or `deleted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_status: Option<String>,
}

/// Who can see a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    /// Anyone can find and watch the video.
    #[default]
    Public,
    /// Anyone with the link can watch the video.
    Unlisted,
    /// Only the owner (and explicitly shared users) can watch the video.
    Private,
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyStatus::Public => write!(f, "public"),
            PrivacyStatus::Unlisted => write!(f, "unlisted"),
            PrivacyStatus::Private => write!(f, "private"),
        }
    }
}

/// Response structure for the `thumbnails.set` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/thumbnails/set#response>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSetResponse {
    #[serde(default)]
    pub kind: String,
    /// The thumbnail sizes generated from the uploaded image.
    #[serde(default)]
    pub items: Vec<ThumbnailDetails>,
}

impl ThumbnailSetResponse {
    /// The URL of the default-size thumbnail, if the service reported one.
    pub fn default_url(&self) -> Option<&str> {
        self.items
            .first()
            .and_then(|details| details.default.as_ref())
            .map(|thumbnail| thumbnail.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_body_only_carries_given_fields() {
        let video = Video {
            id: None,
            snippet: Some(VideoSnippet {
                title: Some("My video".to_string()),
                tags: Some(vec!["b".to_string(), "a".to_string()]),
                category_id: Some("22".to_string()),
                ..Default::default()
            }),
            status: Some(VideoStatus {
                privacy_status: Some(PrivacyStatus::Unlisted),
                upload_status: None,
            }),
        };
        assert_eq!(
            serde_json::to_value(&video).unwrap(),
            serde_json::json!({
                "snippet": {
                    "title": "My video",
                    "tags": ["b", "a"],
                    "categoryId": "22"
                },
                "status": { "privacyStatus": "unlisted" }
            })
        );
    }

    #[test]
    fn parse_status_only_listing() {
        let listing: VideoListResponse = serde_json::from_value(serde_json::json!({
            "kind": "youtube#videoListResponse",
            "etag": "x",
            "items": [{
                "kind": "youtube#video",
                "id": "dQw4w9WgXcQ",
                "status": {
                    "uploadStatus": "processed",
                    "privacyStatus": "public",
                    "license": "youtube",
                    "embeddable": true
                }
            }],
            "pageInfo": { "totalResults": 1, "resultsPerPage": 1 }
        }))
        .unwrap();
        assert_eq!(listing.items.len(), 1);
        let video = &listing.items[0];
        assert_eq!(video.id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(video.snippet, None);
        assert_eq!(
            video.status.as_ref().unwrap().privacy_status,
            Some(PrivacyStatus::Public)
        );
    }

    #[test]
    fn parse_empty_listing() {
        let listing: VideoListResponse = serde_json::from_value(serde_json::json!({
            "kind": "youtube#videoListResponse",
            "items": [],
            "pageInfo": { "totalResults": 0, "resultsPerPage": 0 }
        }))
        .unwrap();
        assert!(listing.items.is_empty());
    }

    #[test]
    fn thumbnail_default_url() {
        let response: ThumbnailSetResponse = serde_json::from_value(serde_json::json!({
            "kind": "youtube#thumbnailSetResponse",
            "items": [{
                "default": {
                    "url": "https://i.ytimg.com/vi/abc/default.jpg",
                    "width": 120,
                    "height": 90
                },
                "high": { "url": "https://i.ytimg.com/vi/abc/hqdefault.jpg" }
            }]
        }))
        .unwrap();
        assert_eq!(
            response.default_url(),
            Some("https://i.ytimg.com/vi/abc/default.jpg")
        );
        assert_eq!(ThumbnailSetResponse::default().default_url(), None);
    }
}
