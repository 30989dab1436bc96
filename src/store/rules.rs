use super::{SqliteStore, to_db_time};
use crate::post::state::PostStyle;
use anyhow::{Context, Result};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;

/// Writing rules learned from reviewer feedback, one list per post style.
pub trait RuleStore: Send + Sync {
    /// Rules for `style`; empty when none have been stored.
    fn fetch_rules(
        &self,
        style: PostStyle,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>>;

    /// Replaces the rules for `style`.
    fn store_rules<'a>(
        &'a self,
        style: PostStyle,
        rules: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

impl SqliteStore {
    async fn fetch_style_rules(&self, style: PostStyle) -> Result<Vec<String>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT rules FROM reflection_rules WHERE style = ?")
                .bind(style.as_ref())
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load reflection rules")?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Corrupt reflection rules for style {style}")),
            None => Ok(Vec::new()),
        }
    }

    async fn store_style_rules(&self, style: PostStyle, rules: &[String]) -> Result<()> {
        sqlx::query(
            "INSERT INTO reflection_rules (style, rules, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(style) DO UPDATE SET rules = excluded.rules, updated_at = excluded.updated_at",
        )
        .bind(style.as_ref())
        .bind(serde_json::to_string(rules)?)
        .bind(to_db_time(Utc::now()))
        .execute(&self.pool)
        .await
        .context("Failed to store reflection rules")?;
        Ok(())
    }
}

impl RuleStore for SqliteStore {
    fn fetch_rules(
        &self,
        style: PostStyle,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(self.fetch_style_rules(style))
    }

    fn store_rules<'a>(
        &'a self,
        style: PostStyle,
        rules: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.store_style_rules(style, rules))
    }
}
