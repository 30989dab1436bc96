use super::uploader::{UploadJob, Uploader};
use crate::error::PublishError;
use crate::prompt::{Prompt, PromptSet};
use crate::store::{PostStore, ScheduledPost};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tera::Context;

/// Result of one publish cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Nothing is due.
    Idle,
    Uploaded { post: ScheduledPost },
    /// The upload failed and the post went back to pending.
    Failed { post_id: String, error: String },
    /// Another publisher claimed the post first.
    Contended { post_id: String },
}

pub struct Publisher {
    store: Arc<dyn PostStore>,
    uploader: Arc<dyn Uploader>,
    prompts: Arc<PromptSet>,
    draft_mode: bool,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn PostStore>,
        uploader: Arc<dyn Uploader>,
        prompts: Arc<PromptSet>,
        draft_mode: bool,
    ) -> Self {
        Self {
            store,
            uploader,
            prompts,
            draft_mode,
        }
    }

    /// Earliest post due at `now`, without claiming it.
    pub async fn peek(&self, now: DateTime<Utc>) -> Result<Option<ScheduledPost>, PublishError> {
        self.store
            .next_pending(now)
            .await
            .map_err(|e| PublishError::Store(format!("{e:#}")))
    }

    /// Claims the earliest due post and uploads it.
    pub async fn publish_next(&self, now: DateTime<Utc>) -> Result<PublishOutcome, PublishError> {
        let Some(post) = self.peek(now).await? else {
            tracing::debug!("no posts due");
            return Ok(PublishOutcome::Idle);
        };

        let claimed = self
            .store
            .claim(&post.id)
            .await
            .map_err(|e| PublishError::Store(format!("{e:#}")))?;
        if !claimed {
            tracing::info!(post_id = %post.id, "post already claimed by another publisher");
            return Ok(PublishOutcome::Contended { post_id: post.id });
        }

        let job = match self.build_job(&post) {
            Ok(job) => job,
            Err(e) => return Ok(self.give_back(&post, &e).await),
        };

        tracing::info!(post_id = %post.id, uploader = self.uploader.name(), "uploading post");
        if let Err(e) = self.uploader.upload(&job).await {
            let err = PublishError::Upload {
                post_id: post.id.clone(),
                message: format!("{e:#}"),
            };
            return Ok(self.give_back(&post, &err.to_string()).await);
        }

        let posted_at = Utc::now();
        self.store
            .mark_uploaded(&post.id, posted_at)
            .await
            .map_err(|e| PublishError::Store(format!("{e:#}")))?;
        tracing::info!(post_id = %post.id, "post uploaded");

        let uploaded = self
            .store
            .get(&post.id)
            .await
            .map_err(|e| PublishError::Store(format!("{e:#}")))?
            .unwrap_or(post);
        Ok(PublishOutcome::Uploaded { post: uploaded })
    }

    fn build_job(&self, post: &ScheduledPost) -> Result<UploadJob, String> {
        let mut ctx = Context::new();
        ctx.insert("post", &post.post);
        ctx.insert("image_path", post.image_path.as_deref().unwrap_or(""));
        ctx.insert("draft_mode", &self.draft_mode);
        let task = self
            .prompts
            .render(Prompt::PublishTask, &ctx)
            .map_err(|e| format!("{e:#}"))?;
        Ok(UploadJob {
            post_id: post.id.clone(),
            task,
            image_path: post.image_path.clone(),
        })
    }

    /// Returns a claimed post to pending; a failed rollback is only logged.
    async fn give_back(&self, post: &ScheduledPost, error: &str) -> PublishOutcome {
        tracing::warn!(post_id = %post.id, error, "upload failed");
        match self.store.release(&post.id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(post_id = %post.id, "post was no longer queued"),
            Err(e) => tracing::warn!(post_id = %post.id, error = %e, "failed to release post"),
        }
        PublishOutcome::Failed {
            post_id: post.id.clone(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewScheduledPost, PostStatus, test_store};
    use anyhow::Result;
    use chrono::TimeZone;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MockUploader {
        fail: bool,
        jobs: Mutex<Vec<UploadJob>>,
    }

    impl Uploader for MockUploader {
        fn name(&self) -> &str {
            "mock"
        }

        fn upload<'a>(
            &'a self,
            job: &'a UploadJob,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.jobs.lock().unwrap().push(job.clone());
                if self.fail {
                    anyhow::bail!("browser crashed");
                }
                Ok(())
            })
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, hour, 0, 0).unwrap()
    }

    async fn setup(fail: bool) -> (TempDir, crate::store::SqliteStore, Arc<MockUploader>, Publisher) {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;
        let uploader = Arc::new(MockUploader {
            fail,
            ..MockUploader::default()
        });
        let publisher = Publisher::new(
            Arc::new(store.clone()),
            uploader.clone(),
            Arc::new(PromptSet::builtin().unwrap()),
            true,
        );
        (tmp, store, uploader, publisher)
    }

    async fn schedule(store: &crate::store::SqliteStore, hour: u32) -> ScheduledPost {
        store
            .insert(&NewScheduledPost {
                topic: "rust".into(),
                post: "Rust 1.90 ships today".into(),
                scheduled_date: at(hour),
                image: None,
                image_path: Some("/tmp/cover.png".into()),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn idle_when_nothing_due() {
        let (_tmp, store, uploader, publisher) = setup(false).await;
        schedule(&store, 18).await;

        assert_eq!(publisher.publish_next(at(17)).await.unwrap(), PublishOutcome::Idle);
        assert!(uploader.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn due_post_is_uploaded() {
        let (_tmp, store, uploader, publisher) = setup(false).await;
        let post = schedule(&store, 9).await;

        let PublishOutcome::Uploaded { post: uploaded } =
            publisher.publish_next(at(10)).await.unwrap()
        else {
            panic!("expected upload");
        };
        assert_eq!(uploaded.id, post.id);
        assert_eq!(uploaded.status, PostStatus::Uploaded);
        assert!(uploaded.posted_date.is_some());

        let jobs = uploader.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].task.contains("Rust 1.90 ships today"));
        assert!(jobs[0].task.contains("/tmp/cover.png"));
        assert!(jobs[0].task.contains("Do NOT click"));
    }

    #[tokio::test]
    async fn failed_upload_returns_post_to_pending() {
        let (_tmp, store, _uploader, publisher) = setup(true).await;
        let post = schedule(&store, 9).await;

        let outcome = publisher.publish_next(at(10)).await.unwrap();
        assert!(
            matches!(&outcome, PublishOutcome::Failed { post_id, error } if *post_id == post.id && error.contains("browser crashed")),
            "{outcome:?}"
        );
        assert_eq!(
            store.get(&post.id).await.unwrap().unwrap().status,
            PostStatus::Pending
        );
    }

    #[tokio::test]
    async fn claimed_post_is_not_uploaded_twice() {
        let (_tmp, store, uploader, publisher) = setup(false).await;
        let post = schedule(&store, 9).await;
        assert!(store.claim(&post.id).await.unwrap());

        // Claimed posts are no longer pending, so the cycle sees nothing.
        assert_eq!(publisher.publish_next(at(10)).await.unwrap(), PublishOutcome::Idle);
        assert!(uploader.jobs.lock().unwrap().is_empty());
    }
}
