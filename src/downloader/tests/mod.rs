use super::test_helpers::*;
use crate::error::DownloadError;
use crate::types::{DownloadType, Event, PlatformType, Progress, VideoQuality};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod lifecycle;

/// Serve `body` at `route` on `server`
async fn mount_payload(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Serve `body` at `route` after `delay`
async fn mount_slow_payload(server: &MockServer, route: &str, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Answer one request with `head` followed by `body`, then close the connection
///
/// Returns the payload URL. Lets tests send responses wiremock cannot produce,
/// such as a close-delimited body or one shorter than its Content-Length.
async fn serve_raw_once(head: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = head.to_string();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}/media/video.mp4", addr)
}

/// Numeric progress values must never go down and stay within [0, 1]
fn assert_monotonic(progress: &[Progress]) {
    let mut last = 0.0_f64;
    for p in progress {
        if let Progress::Fraction(f) = p {
            assert!((0.0..=1.0).contains(f), "progress {} out of range", f);
            assert!(*f >= last, "progress went from {} to {}", last, f);
            last = *f;
        }
    }
}
