use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use postwright::prompt::PromptSet;
use postwright::publisher::{self, PublishOutcome, Publisher, UploadJob, Uploader};
use postwright::store::{NewScheduledPost, PostStatus, PostStore, ScheduledPost, SqliteStore};

async fn open_store(tmp: &TempDir) -> SqliteStore {
    SqliteStore::open(&tmp.path().join("postwright.db"))
        .await
        .unwrap()
}

async fn schedule(store: &SqliteStore, topic: &str, when: DateTime<Utc>) -> ScheduledPost {
    store
        .insert(&NewScheduledPost {
            topic: topic.into(),
            post: format!("All about {topic}."),
            scheduled_date: when,
            image: None,
            image_path: None,
        })
        .await
        .unwrap()
}

#[derive(Default)]
struct CountingUploader {
    jobs: AtomicUsize,
}

impl Uploader for CountingUploader {
    fn name(&self) -> &str {
        "counting"
    }

    fn upload<'a>(
        &'a self,
        _job: &'a UploadJob,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.jobs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// A store where a rival publisher always wins the claim.
struct RivalStore(SqliteStore);

impl PostStore for RivalStore {
    fn insert<'a>(
        &'a self,
        post: &'a NewScheduledPost,
    ) -> Pin<Box<dyn Future<Output = Result<ScheduledPost>> + Send + 'a>> {
        self.0.insert(post)
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ScheduledPost>>> + Send + 'a>> {
        self.0.get(id)
    }

    fn list(
        &self,
        status: Option<PostStatus>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScheduledPost>>> + Send + '_>> {
        PostStore::list(&self.0, status)
    }

    fn next_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ScheduledPost>>> + Send + '_>> {
        self.0.next_pending(now)
    }

    fn claim<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            assert!(self.0.claim(id).await?, "rival claim");
            self.0.claim(id).await
        })
    }

    fn mark_uploaded<'a>(
        &'a self,
        id: &'a str,
        posted_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.0.mark_uploaded(id, posted_at)
    }

    fn release<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        self.0.release(id)
    }
}

fn prompts() -> Arc<PromptSet> {
    Arc::new(PromptSet::builtin().unwrap())
}

#[tokio::test]
async fn lost_claim_is_reported_as_contended() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let post = schedule(&store, "Rust", Utc::now() - Duration::minutes(5)).await;

    let uploader = Arc::new(CountingUploader::default());
    let publisher = Publisher::new(
        Arc::new(RivalStore(store.clone())),
        uploader.clone(),
        prompts(),
        false,
    );

    let outcome = publisher.publish_next(Utc::now()).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Contended {
            post_id: post.id.clone()
        }
    );
    assert_eq!(uploader.jobs.load(Ordering::SeqCst), 0);
    // The rival holds it; nothing is returned to pending.
    let stored = store.get(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Queued);
}

#[tokio::test]
async fn future_posts_wait_for_their_date() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let later = schedule(&store, "Later", Utc::now() + Duration::days(2)).await;

    let uploader = Arc::new(CountingUploader::default());
    let publisher = Publisher::new(Arc::new(store.clone()), uploader.clone(), prompts(), false);

    assert!(publisher.peek(Utc::now()).await.unwrap().is_none());
    assert_eq!(
        publisher.publish_next(Utc::now()).await.unwrap(),
        PublishOutcome::Idle
    );

    let due = publisher
        .peek(later.scheduled_date + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(due.map(|p| p.id), Some(later.id));
}

#[tokio::test]
async fn scheduler_loop_publishes_due_posts_until_cancelled() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let first = schedule(&store, "First", Utc::now() - Duration::hours(2)).await;

    let uploader = Arc::new(CountingUploader::default());
    let publisher = Arc::new(Publisher::new(
        Arc::new(store.clone()),
        uploader.clone(),
        prompts(),
        false,
    ));

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(publisher::scheduler::run(
        publisher,
        60,
        shutdown.clone(),
    ));

    // The first tick fires immediately.
    let mut uploaded = false;
    for _ in 0..50 {
        let post = store.get(&first.id).await.unwrap().unwrap();
        if post.status == PostStatus::Uploaded {
            uploaded = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert!(uploaded, "due post was not published");

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .expect("loop stops on cancel")
        .unwrap();
    assert_eq!(uploader.jobs.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn command_uploader_receives_the_rendered_task() {
    use postwright::publisher::CommandUploader;

    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let post = schedule(&store, "Async closures", Utc::now() - Duration::minutes(1)).await;

    let out_dir = tmp.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    let script = format!(
        r#"cat > "{}/$POSTWRIGHT_POST_ID.txt""#,
        out_dir.display()
    );
    let uploader = CommandUploader::new("sh", vec!["-c".into(), script], 10);
    let publisher = Publisher::new(Arc::new(store.clone()), Arc::new(uploader), prompts(), true);

    let outcome = publisher.publish_next(Utc::now()).await.unwrap();
    let uploaded = match outcome {
        PublishOutcome::Uploaded { post } => post,
        other => panic!("expected upload, got {other:?}"),
    };
    assert_eq!(uploaded.status, PostStatus::Uploaded);
    assert!(uploaded.posted_date.is_some());

    let task = std::fs::read_to_string(out_dir.join(format!("{}.txt", post.id))).unwrap();
    assert!(task.contains("All about Async closures."));
    assert!(task.contains("Do NOT click the final \"Post\" button"));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_leaves_post_pending() {
    use postwright::publisher::CommandUploader;

    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let post = schedule(&store, "Rust", Utc::now() - Duration::minutes(1)).await;

    let uploader = CommandUploader::new(
        "sh",
        vec!["-c".into(), "cat > /dev/null; echo 'browser crashed' >&2; exit 3".into()],
        10,
    );
    let publisher = Publisher::new(Arc::new(store.clone()), Arc::new(uploader), prompts(), false);

    let outcome = publisher.publish_next(Utc::now()).await.unwrap();
    let (post_id, error) = match outcome {
        PublishOutcome::Failed { post_id, error } => (post_id, error),
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(post_id, post.id);
    assert!(error.contains("browser crashed"), "{error}");

    let stored = store.get(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Pending);
}
