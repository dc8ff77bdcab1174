//! Resumable upload protocol types.
//!
//! A resumable upload is started with a metadata request whose response `Location` is the
//! session URI. The media is then `PUT` to that URI in pieces, each carrying a
//! `Content-Range`. The service answers `308 Resume Incomplete` until it has the last byte,
//! and then answers with the created resource.
//!
//! See: <https://developers.google.com/youtube/v3/guides/using_resumable_upload_protocol>

/// Chunk size for every resumable upload. Must be a multiple of 256 KiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// An open resumable upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// The session URI returned in the `Location` header of the initiating request.
    pub url: String,
    /// MIME type announced for the media, repeated on every chunk.
    pub content_type: &'static str,
    pub access_token: String,
}

/// What the service said about one submitted chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    /// More bytes are expected. `received` is the number of bytes the service reports
    /// holding, if it said.
    Incomplete { received: Option<u64> },
    /// The upload finished; this is the response body describing the created resource.
    Complete(serde_json::Value),
}

/// The `Content-Range` header for `len` bytes at `offset` of a `total`-byte upload.
pub fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {offset}-{}/{total}", offset + len - 1)
    }
}

/// Number of bytes acknowledged by a `Range: bytes=0-N` header on a 308 response.
pub fn received_bytes(range: &str) -> Option<u64> {
    let (_, last) = range.strip_prefix("bytes=")?.split_once('-')?;
    last.trim().parse::<u64>().ok().map(|last| last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_ranges() {
        assert_eq!(content_range(0, 1024, 4096), "bytes 0-1023/4096");
        assert_eq!(content_range(3072, 1024, 4096), "bytes 3072-4095/4096");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
    }

    #[test]
    fn range_header() {
        assert_eq!(received_bytes("bytes=0-1048575"), Some(1_048_576));
        assert_eq!(received_bytes("bytes=0-0"), Some(1));
        assert_eq!(received_bytes("0-12"), None);
        assert_eq!(received_bytes("bytes=garbage"), None);
    }
}
