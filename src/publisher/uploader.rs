use crate::config::PublisherConfig;
use anyhow::{Context, Result, bail};
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

/// One post handed to the browser automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub post_id: String,
    /// Rendered `publish_task` prompt.
    pub task: String,
    pub image_path: Option<String>,
}

/// Publishes a post through an external automation.
pub trait Uploader: Send + Sync {
    fn name(&self) -> &str;

    fn upload<'a>(
        &'a self,
        job: &'a UploadJob,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Runs the configured command with the task on stdin. Exit status zero
/// means the post went out.
pub struct CommandUploader {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

const MAX_OUTPUT_CHARS: usize = 400;

impl CommandUploader {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// `None` when no command is configured.
    pub fn from_config(config: &PublisherConfig) -> Option<Self> {
        let program = config.command.as_deref()?.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(program, config.args.clone(), config.timeout_secs))
    }

    async fn run(&self, job: &UploadJob) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("POSTWRIGHT_POST_ID", &job.post_id)
            .env(
                "POSTWRIGHT_IMAGE_PATH",
                job.image_path.as_deref().unwrap_or(""),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn uploader '{}'", self.program))?;

        let stdin = child.stdin.take();
        let task = job.task.as_bytes();
        let write_task = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(task).await {
                // The command may exit without reading the whole task.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        // Writing and waiting share one deadline; the child is killed on drop.
        let (written, output) = timeout(self.timeout, async {
            tokio::join!(write_task, child.wait_with_output())
        })
        .await
        .with_context(|| format!("Uploader timed out after {}s", self.timeout.as_secs()))?;
        let output = output.context("Uploader did not exit cleanly")?;
        written.context("Failed to write task to uploader stdin")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(post_id = %job.post_id, output = %stdout.trim(), "uploader output");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.trim().chars().take(MAX_OUTPUT_CHARS).collect();
            bail!("Uploader exited with {}: {tail}", output.status);
        }
        Ok(())
    }
}

impl Uploader for CommandUploader {
    fn name(&self) -> &str {
        &self.program
    }

    fn upload<'a>(
        &'a self,
        job: &'a UploadJob,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.run(job))
    }
}
