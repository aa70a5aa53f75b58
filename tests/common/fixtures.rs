//! Media payloads and resolver responses

use serde_json::{Value, json};

/// YouTube page URL used throughout the tests
pub const YOUTUBE_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Instagram post URL used throughout the tests
pub const INSTAGRAM_URL: &str = "https://www.instagram.com/p/C0ffee/";

/// Route the mock server serves video payloads on
pub const VIDEO_ROUTE: &str = "/cdn/video.mp4";

/// Route the mock server serves photo payloads on
pub const PHOTO_ROUTE: &str = "/cdn/photo.jpg";

/// ISO base media file: `ftyp` box followed by `len` filler bytes
pub fn mp4_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00isomiso2".to_vec();
    bytes.extend(std::iter::repeat_n(0x5A, len));
    bytes
}

/// JPEG: SOI + APP0 marker followed by `len` filler bytes
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    bytes.extend(std::iter::repeat_n(0x33, len));
    bytes
}

/// Details response for a video offered in 360p and 720p
pub fn video_details(base: &str) -> Value {
    json!({
        "title": "Never Gonna Give You Up",
        "kind": "video",
        "qualities": ["360p", "720p"],
        "assets": [
            {"url": format!("{}{}", base, VIDEO_ROUTE), "kind": "video", "quality": "720p"},
            {"url": format!("{}{}", base, VIDEO_ROUTE), "kind": "video", "quality": "360p"}
        ]
    })
}

/// Details response for a single photo post
pub fn photo_details(base: &str) -> Value {
    json!({
        "kind": "photo",
        "assets": [
            {"url": format!("{}{}", base, PHOTO_ROUTE), "kind": "photo"}
        ]
    })
}
