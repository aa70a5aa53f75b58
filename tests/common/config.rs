//! Test configuration helpers for creating downloaders against a mock server

use media_dl::{
    Config, DirectorySink, Downloader, DownloaderServices, HttpDetailResolver, StaticGate,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Everything a test needs to drive downloads end to end
pub struct TestStack {
    pub downloader: Downloader,
    pub sink: Arc<DirectorySink>,
    pub gate: Arc<StaticGate>,
    pub temp_dir: PathBuf,
    pub library_dir: PathBuf,
    /// Keeps the directories alive for the duration of the test
    pub dir: TempDir,
}

impl TestStack {
    /// Files left in the transfer temp directory
    pub fn leftover_payloads(&self) -> usize {
        std::fs::read_dir(&self.temp_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Files committed to the library
    pub fn library_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.library_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

/// Configuration pointing the resolver at `server`
pub fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.resolver.api_base_url = server.uri();
    config.resolver.timeout = Duration::from_secs(5);
    config.transfer.temp_dir = dir.path().join("temp");
    config.transfer.timeout = Some(Duration::from_secs(10));
    config.transfer.progress_step = 0.05;
    config
}

/// Create a downloader using the HTTP resolver and a directory sink
pub fn create_test_stack(server: &MockServer) -> TestStack {
    create_test_stack_with(server, |_| {})
}

/// Same as [`create_test_stack`] with a configuration tweak
pub fn create_test_stack_with(server: &MockServer, tweak: impl FnOnce(&mut Config)) -> TestStack {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(server, &dir);
    tweak(&mut config);

    let temp_dir = config.transfer.temp_dir.clone();
    let library_dir = dir.path().join("library");

    let resolver = Arc::new(HttpDetailResolver::new(&config.resolver).unwrap());
    let sink = Arc::new(DirectorySink::new(&library_dir));
    let gate = Arc::new(StaticGate::new(true));

    let services =
        DownloaderServices::new(resolver, sink.clone()).with_permission_gate(gate.clone());
    let downloader = Downloader::new(config, services).unwrap();

    TestStack {
        downloader,
        sink,
        gate,
        temp_dir,
        library_dir,
        dir,
    }
}
