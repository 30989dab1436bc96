use super::types::Checkpoint;
use super::{SqliteStore, parse_db_time, to_db_time};
use crate::post::node::Node;
use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::future::Future;
use std::pin::Pin;

/// Durable storage for suspended workflow runs, keyed by workflow id.
pub trait CheckpointStore: Send + Sync {
    /// Inserts or replaces the checkpoint for `checkpoint.workflow_id`.
    fn save<'a>(
        &'a self,
        checkpoint: &'a Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn load<'a>(
        &'a self,
        workflow_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>>> + Send + 'a>>;

    /// `false` when there was nothing to delete.
    fn delete<'a>(
        &'a self,
        workflow_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Clears the pending interrupt if it is still `interrupt_id`.
    ///
    /// Exactly one caller wins per interrupt; the rest get `false`.
    fn claim_interrupt<'a>(
        &'a self,
        workflow_id: &'a str,
        interrupt_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// All checkpoints, oldest update first.
    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Checkpoint>>> + Send + '_>>;
}

const SELECT_CHECKPOINT: &str =
    "SELECT workflow_id, node, interrupt_id, state, request, updated_at FROM workflow_checkpoints";

fn row_to_checkpoint(row: &SqliteRow) -> Result<Checkpoint> {
    let workflow_id: String = row.get("workflow_id");
    let node_raw: String = row.get("node");
    let state_raw: String = row.get("state");
    let request_raw: Option<String> = row.get("request");
    let updated_raw: String = row.get("updated_at");

    let node: Node = node_raw
        .parse()
        .with_context(|| format!("Unknown node '{node_raw}' in checkpoint {workflow_id}"))?;
    let state = serde_json::from_str(&state_raw)
        .with_context(|| format!("Corrupt state in checkpoint {workflow_id}"))?;
    let request = request_raw
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .with_context(|| format!("Corrupt review request in checkpoint {workflow_id}"))?;

    Ok(Checkpoint {
        node,
        interrupt_id: row.get("interrupt_id"),
        state,
        request,
        updated_at: parse_db_time(&updated_raw)?,
        workflow_id,
    })
}

impl SqliteStore {
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let state = serde_json::to_string(&checkpoint.state)?;
        let request = checkpoint
            .request
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO workflow_checkpoints
                (workflow_id, node, interrupt_id, state, request, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(workflow_id) DO UPDATE SET
                node = excluded.node,
                interrupt_id = excluded.interrupt_id,
                state = excluded.state,
                request = excluded.request,
                updated_at = excluded.updated_at",
        )
        .bind(&checkpoint.workflow_id)
        .bind(checkpoint.node.as_ref())
        .bind(checkpoint.interrupt_id.as_deref())
        .bind(state)
        .bind(request)
        .bind(to_db_time(checkpoint.updated_at))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save checkpoint {}", checkpoint.workflow_id))?;
        Ok(())
    }

    async fn load_checkpoint(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(&format!("{SELECT_CHECKPOINT} WHERE workflow_id = ?"))
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load checkpoint")?;
        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn delete_checkpoint(&self, workflow_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflow_checkpoints WHERE workflow_id = ?")
            .bind(workflow_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete checkpoint")?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_interrupt(&self, workflow_id: &str, interrupt_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workflow_checkpoints SET interrupt_id = NULL
             WHERE workflow_id = ? AND interrupt_id = ?",
        )
        .bind(workflow_id)
        .bind(interrupt_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to claim interrupt of {workflow_id}"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(&format!("{SELECT_CHECKPOINT} ORDER BY updated_at ASC"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list checkpoints")?;
        rows.iter().map(row_to_checkpoint).collect()
    }
}

impl CheckpointStore for SqliteStore {
    fn save<'a>(
        &'a self,
        checkpoint: &'a Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.save_checkpoint(checkpoint))
    }

    fn load<'a>(
        &'a self,
        workflow_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>>> + Send + 'a>> {
        Box::pin(self.load_checkpoint(workflow_id))
    }

    fn delete<'a>(
        &'a self,
        workflow_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(self.delete_checkpoint(workflow_id))
    }

    fn claim_interrupt<'a>(
        &'a self,
        workflow_id: &'a str,
        interrupt_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(self.clear_interrupt(workflow_id, interrupt_id))
    }

    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Checkpoint>>> + Send + '_>> {
        Box::pin(self.list_checkpoints())
    }
}
