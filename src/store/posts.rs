use super::types::{NewScheduledPost, PostStatus, ScheduledPost};
use super::{SqliteStore, parse_db_time, to_db_time};
use crate::post::state::PostImage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// Persistence contract for scheduled posts.
pub trait PostStore: Send + Sync {
    fn insert<'a>(
        &'a self,
        post: &'a NewScheduledPost,
    ) -> Pin<Box<dyn Future<Output = Result<ScheduledPost>> + Send + 'a>>;

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ScheduledPost>>> + Send + 'a>>;

    fn list(
        &self,
        status: Option<PostStatus>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScheduledPost>>> + Send + '_>>;

    /// Earliest pending post whose scheduled date is at or before `now`.
    fn next_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ScheduledPost>>> + Send + '_>>;

    /// Atomically moves a post from `pending` to `queued`. `false` means
    /// another publisher claimed it first.
    fn claim<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    fn mark_uploaded<'a>(
        &'a self,
        id: &'a str,
        posted_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Returns a queued post to `pending` after a failed upload.
    fn release<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;
}

const SELECT_POST: &str = "SELECT id, topic, post, scheduled_date, status, image_url, image_mime,
        image_path, created_date, posted_date
 FROM scheduled_posts";

fn row_to_post(row: &SqliteRow) -> Result<ScheduledPost> {
    let status_raw: String = row.get("status");
    let scheduled_raw: String = row.get("scheduled_date");
    let created_raw: String = row.get("created_date");
    let posted_raw: Option<String> = row.get("posted_date");
    let image_url: Option<String> = row.get("image_url");
    let image_mime: Option<String> = row.get("image_mime");

    Ok(ScheduledPost {
        id: row.get("id"),
        topic: row.get("topic"),
        post: row.get("post"),
        scheduled_date: parse_db_time(&scheduled_raw)?,
        status: status_raw
            .parse()
            .with_context(|| format!("Unknown post status in store: {status_raw}"))?,
        image: image_url.map(|url| PostImage {
            url,
            mime_type: image_mime.unwrap_or_default(),
        }),
        image_path: row.get("image_path"),
        created_date: parse_db_time(&created_raw)?,
        posted_date: posted_raw.as_deref().map(parse_db_time).transpose()?,
    })
}

impl SqliteStore {
    async fn insert_post(&self, new: &NewScheduledPost) -> Result<ScheduledPost> {
        let id = Uuid::new_v4().to_string();
        let created_date = Utc::now();

        sqlx::query(
            "INSERT INTO scheduled_posts (
                id, topic, post, scheduled_date, status, image_url, image_mime, image_path, created_date
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.topic)
        .bind(&new.post)
        .bind(to_db_time(new.scheduled_date))
        .bind(PostStatus::Pending.as_ref())
        .bind(new.image.as_ref().map(|i| i.url.as_str()))
        .bind(new.image.as_ref().map(|i| i.mime_type.as_str()))
        .bind(new.image_path.as_deref())
        .bind(to_db_time(created_date))
        .execute(&self.pool)
        .await
        .context("Failed to insert scheduled post")?;

        Ok(ScheduledPost {
            id,
            topic: new.topic.clone(),
            post: new.post.clone(),
            scheduled_date: new.scheduled_date,
            status: PostStatus::Pending,
            image: new.image.clone(),
            image_path: new.image_path.clone(),
            created_date: parse_db_time(&to_db_time(created_date))?,
            posted_date: None,
        })
    }

    async fn get_post(&self, id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(&format!("{SELECT_POST} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load scheduled post")?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<ScheduledPost>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "{SELECT_POST} WHERE status = ? ORDER BY scheduled_date ASC"
                ))
                .bind(status.as_ref())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("{SELECT_POST} ORDER BY scheduled_date ASC"))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to list scheduled posts")?;

        rows.iter().map(row_to_post).collect()
    }

    async fn next_pending_post(&self, now: DateTime<Utc>) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(&format!(
            "{SELECT_POST}
             WHERE status = 'pending' AND scheduled_date <= ?
             ORDER BY scheduled_date ASC, created_date ASC
             LIMIT 1"
        ))
        .bind(to_db_time(now))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query next pending post")?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn transition(&self, id: &str, from: PostStatus, to: PostStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE scheduled_posts SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_ref())
            .bind(id)
            .bind(from.as_ref())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to move post {id} from {from} to {to}"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_post_uploaded(&self, id: &str, posted_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE scheduled_posts SET status = 'uploaded', posted_date = ?
             WHERE id = ? AND status = 'queued'",
        )
        .bind(to_db_time(posted_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark post uploaded")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Post '{id}' is not queued");
        }
        Ok(())
    }
}

impl PostStore for SqliteStore {
    fn insert<'a>(
        &'a self,
        post: &'a NewScheduledPost,
    ) -> Pin<Box<dyn Future<Output = Result<ScheduledPost>> + Send + 'a>> {
        Box::pin(self.insert_post(post))
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ScheduledPost>>> + Send + 'a>> {
        Box::pin(self.get_post(id))
    }

    fn list(
        &self,
        status: Option<PostStatus>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScheduledPost>>> + Send + '_>> {
        Box::pin(self.list_posts(status))
    }

    fn next_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ScheduledPost>>> + Send + '_>> {
        Box::pin(self.next_pending_post(now))
    }

    fn claim<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(self.transition(id, PostStatus::Pending, PostStatus::Queued))
    }

    fn mark_uploaded<'a>(
        &'a self,
        id: &'a str,
        posted_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.mark_post_uploaded(id, posted_at))
    }

    fn release<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(self.transition(id, PostStatus::Queued, PostStatus::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;
    use chrono::{TimeDelta, TimeZone};
    use tempfile::TempDir;

    fn new_post(topic: &str, scheduled_date: DateTime<Utc>) -> NewScheduledPost {
        NewScheduledPost {
            topic: topic.into(),
            post: format!("post about {topic}"),
            scheduled_date,
            image: None,
            image_path: None,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 17, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        let mut new = new_post("rust", at(16));
        new.image = Some(PostImage {
            url: "https://cdn.example.com/a.png".into(),
            mime_type: "image/png".into(),
        });
        new.image_path = Some("/tmp/a.png".into());

        let inserted = store.insert(&new).await.unwrap();
        assert_eq!(inserted.status, PostStatus::Pending);

        let loaded = store.get(&inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded, inserted);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn next_pending_respects_schedule_and_order() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        let later = store.insert(&new_post("later", at(18))).await.unwrap();
        let earlier = store.insert(&new_post("earlier", at(16))).await.unwrap();

        assert!(store.next_pending(at(15)).await.unwrap().is_none());
        assert_eq!(store.next_pending(at(16)).await.unwrap().unwrap().id, earlier.id);
        assert_eq!(store.next_pending(at(20)).await.unwrap().unwrap().id, earlier.id);

        assert!(store.claim(&earlier.id).await.unwrap());
        assert_eq!(store.next_pending(at(20)).await.unwrap().unwrap().id, later.id);
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;
        let post = store.insert(&new_post("rust", at(16))).await.unwrap();

        let (a, b) = tokio::join!(store.claim(&post.id), store.claim(&post.id));
        assert_eq!([a.unwrap(), b.unwrap()].iter().filter(|won| **won).count(), 1);
        assert_eq!(
            store.get(&post.id).await.unwrap().unwrap().status,
            PostStatus::Queued
        );
    }

    #[tokio::test]
    async fn upload_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;
        let post = store.insert(&new_post("rust", at(16))).await.unwrap();

        // Only queued posts can be marked uploaded.
        assert!(store.mark_uploaded(&post.id, at(17)).await.is_err());

        assert!(store.claim(&post.id).await.unwrap());
        store.mark_uploaded(&post.id, at(17)).await.unwrap();

        let loaded = store.get(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Uploaded);
        assert_eq!(loaded.posted_date, Some(at(17)));
        assert!(!store.release(&post.id).await.unwrap());
    }

    #[tokio::test]
    async fn release_returns_post_to_pending() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;
        let post = store.insert(&new_post("rust", at(16))).await.unwrap();

        assert!(store.claim(&post.id).await.unwrap());
        assert!(store.next_pending(at(20)).await.unwrap().is_none());
        assert!(store.release(&post.id).await.unwrap());
        assert_eq!(
            store.next_pending(at(20)).await.unwrap().unwrap().id,
            post.id
        );
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;
        let a = store.insert(&new_post("a", at(16))).await.unwrap();
        store
            .insert(&new_post("b", at(16) + TimeDelta::hours(1)))
            .await
            .unwrap();
        store.claim(&a.id).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        let queued = store.list(Some(PostStatus::Queued)).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, a.id);
    }
}
