//! # media-dl
//!
//! Download orchestration and progress reporting for YouTube and Instagram media.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - No UI, purely a Rust crate for embedding in an app
//! - **Per-call event channels** - Every download call gets its own ordered stream
//!   of progress events followed by exactly one terminal event
//! - **Closed error taxonomy** - Every failure is classified into a [`DownloadError`]
//!   before it reaches the caller
//! - **Pluggable platform seams** - Detail resolution, media storage and permission
//!   checks are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{
//!     Config, DirectorySink, Downloader, DownloaderServices, Event, HttpDetailResolver,
//!     PlatformType, VideoQuality,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let resolver = Arc::new(HttpDetailResolver::new(&config.resolver)?);
//!     let sink = Arc::new(DirectorySink::new("/tmp/library"));
//!     let downloader = Downloader::new(config, DownloaderServices::new(resolver, sink))?;
//!
//!     let url = "https://youtu.be/dQw4w9WgXcQ";
//!     let mut events = downloader.download(url, PlatformType::detect(url), VideoQuality::P720);
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             Event::Progress(p) => println!("progress: {:?}", p),
//!             Event::Completed(file) => println!("done: {}", file.path().display()),
//!             Event::Failed(e) => println!("failed: {}", e.user_message()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Failure classification
pub mod classify;
/// Configuration types
pub mod config;
/// Download orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Registry of active transfers for bulk cancellation
pub mod registry;
/// Detail resolvers
pub mod resolver;
/// Caller-visible download state
pub mod session;
/// Media library sink and permission gates
pub mod sink;
/// In-flight transfers
pub mod transfer;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, ResolverConfig, TransferConfig};
pub use downloader::{DownloadEvents, DownloadOutcome, Downloader, DownloaderServices};
pub use error::{DownloadError, Error, ResolveError, Result};
pub use registry::TaskRegistry;
pub use resolver::{DetailResolver, HttpDetailResolver, StaticResolver};
pub use session::{DownloadSession, SessionState};
pub use sink::{AlwaysGranted, DirectorySink, MediaSink, PermissionGate, StaticGate};
pub use transfer::TransferTask;
pub use types::{
    DownloadStatus, DownloadType, DownloadedFile, Event, MediaAsset, MediaDescriptor, OwnerId,
    PlatformType, Progress, TransferId, VideoQuality,
};
