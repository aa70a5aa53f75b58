//! The work a spawned download performs.
//!
//! Permission gate, detail resolution, asset selection, the transfer itself and
//! the compatibility check run in order; the first failure ends the download.
//! The whole pipeline races against the transfer's cancellation token.

use crate::config::Config;
use crate::error::DownloadError;
use crate::transfer::{TransferOutput, TransferTask};
use crate::types::{DownloadedFile, Event, PlatformType, VideoQuality};
use std::sync::Arc;

use super::{ActiveSlot, DownloaderServices, lock_slot};

/// Everything a spawned download needs from its downloader
pub(crate) struct PipelineContext {
    pub(crate) client: reqwest::Client,
    pub(crate) config: Arc<Config>,
    pub(crate) services: DownloaderServices,
    pub(crate) slot: ActiveSlot,
}

/// Drive one download to its terminal event
pub(crate) async fn run(
    ctx: PipelineContext,
    task: Arc<TransferTask>,
    url: String,
    platform: PlatformType,
    quality: VideoQuality,
) {
    let outcome = tokio::select! {
        biased;
        _ = task.token().cancelled() => None,
        result = execute(&ctx, &task, &url, platform, quality) => Some(result),
    };

    finish(&ctx, &task, outcome);
}

async fn execute(
    ctx: &PipelineContext,
    task: &TransferTask,
    url: &str,
    platform: PlatformType,
    quality: VideoQuality,
) -> Result<DownloadedFile, DownloadError> {
    ctx.services.permission.ensure_granted().await?;

    let descriptor = ctx
        .services
        .resolver
        .resolve(url, platform)
        .await
        .map_err(|e| {
            tracing::warn!(
                transfer_id = task.id().0,
                resolver = ctx.services.resolver.name(),
                error = %e,
                "Detail resolution failed"
            );
            DownloadError::from(e)
        })?;

    let asset = descriptor.select_asset(quality)?;
    tracing::debug!(
        transfer_id = task.id().0,
        kind = ?asset.kind,
        asset_quality = ?asset.quality,
        "Resolved media asset"
    );

    let output = transfer(ctx, task, &asset.url).await?;

    if !ctx.services.sink.is_compatible(&output.file, asset.kind).await {
        return Err(DownloadError::NotCompatible);
    }

    Ok(DownloadedFile::new(output.file, asset.kind, output.size_bytes))
}

/// Run the transfer under the configured per-transfer timeout
async fn transfer(
    ctx: &PipelineContext,
    task: &TransferTask,
    asset_url: &str,
) -> Result<TransferOutput, DownloadError> {
    let step = ctx.config.transfer.progress_step;
    match ctx.config.transfer.timeout {
        Some(limit) => tokio::time::timeout(limit, task.execute(&ctx.client, asset_url, step))
            .await
            .map_err(|_| {
                DownloadError::TransportFault(format!(
                    "transfer timed out after {}s",
                    limit.as_secs_f64()
                ))
            })?,
        None => task.execute(&ctx.client, asset_url, step).await,
    }
}

/// Release the slot and deliver the terminal event
///
/// Both happen under the slot lock, so invalidation either cancels the task
/// before the terminal event or finds the slot already released.
fn finish(
    ctx: &PipelineContext,
    task: &Arc<TransferTask>,
    outcome: Option<Result<DownloadedFile, DownloadError>>,
) {
    let mut slot = lock_slot(&ctx.slot);
    if slot.as_ref().is_some_and(|active| Arc::ptr_eq(active, task)) {
        *slot = None;
    }
    ctx.services.registry.deregister(task.owner(), task.id());

    let transfer_id = task.id().0;
    match outcome {
        None => {
            tracing::info!(transfer_id, "Transfer cancelled");
        }
        Some(Ok(file)) => {
            let size_bytes = file.size_bytes();
            if task.events.finish(Event::Completed(file)) {
                tracing::info!(transfer_id, size_bytes, "Download completed");
            } else {
                tracing::debug!(transfer_id, "Completion discarded, channel closed");
            }
        }
        Some(Err(e)) => {
            tracing::warn!(transfer_id, code = e.code(), error = %e, "Download failed");
            task.events.finish(Event::Failed(e));
        }
    }
}
