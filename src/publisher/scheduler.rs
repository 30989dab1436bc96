use super::cycle::{PublishOutcome, Publisher};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_POLL_SECONDS: u64 = 5;

/// Runs a publish cycle every `poll_secs` until `shutdown` is cancelled.
pub async fn run(publisher: Arc<Publisher>, poll_secs: u64, shutdown: CancellationToken) {
    let poll_secs = poll_secs.max(MIN_POLL_SECONDS);
    let mut interval = time::interval(Duration::from_secs(poll_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(poll_secs, "publisher loop started");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match publisher.publish_next(Utc::now()).await {
            Ok(PublishOutcome::Idle) => {}
            Ok(PublishOutcome::Uploaded { post }) => {
                tracing::info!(post_id = %post.id, "published scheduled post");
            }
            Ok(PublishOutcome::Failed { post_id, error }) => {
                tracing::warn!(post_id = %post_id, error = %error, "publish attempt failed");
            }
            Ok(PublishOutcome::Contended { post_id }) => {
                tracing::debug!(post_id = %post_id, "publish skipped; post claimed elsewhere");
            }
            Err(e) => tracing::warn!("Publisher cycle failed: {e}"),
        }
    }
    tracing::info!("publisher loop stopped");
}
