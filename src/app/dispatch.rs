use crate::Config;
use crate::cli::{Cli, Commands, ResumeArgs, RulesCommands};
use crate::gateway::{self, AppState};
use crate::llm::WorkflowModels;
use crate::post::{PostWorkflow, RawReviewResponse, ReviewPayload, RunOutcome, WorkflowDeps};
use crate::prompt::PromptSet;
use crate::publisher::{self, CommandUploader, PublishOutcome, Publisher};
use crate::store::{PostStore, RuleStore, SqliteStore};
use crate::verify::HttpWebFetcher;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Long-lived services shared by every command.
struct Services {
    store: SqliteStore,
    workflow: Arc<PostWorkflow>,
    publisher: Option<Arc<Publisher>>,
}

async fn build_services(config: &Config) -> Result<Services> {
    let store = SqliteStore::open(&config.database_path()).await?;
    let prompts = Arc::new(
        PromptSet::with_overrides(config.template_dir().as_deref())
            .context("load prompt templates")?,
    );
    let models = WorkflowModels::from_config(&config.llm, &config.workflow)
        .context("resolve workflow models")?;
    let fetcher = Arc::new(HttpWebFetcher::new(&config.verify)?);
    let shared = Arc::new(store.clone());

    let deps = WorkflowDeps {
        models,
        fetcher,
        posts: shared.clone(),
        checkpoints: shared.clone(),
        rules: shared.clone(),
        prompts: Arc::clone(&prompts),
        config: config.workflow.clone(),
        timezone: config.timezone(),
        image_dir: config.image_dir(),
    };

    let publisher = CommandUploader::from_config(&config.publisher).map(|uploader| {
        Arc::new(Publisher::new(
            shared,
            Arc::new(uploader),
            Arc::clone(&prompts),
            config.publisher.draft_mode,
        ))
    });

    Ok(Services {
        store,
        workflow: Arc::new(PostWorkflow::new(deps)),
        publisher,
    })
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::AwaitingReview {
            workflow_id,
            request,
        } => {
            println!("{}", request.description);
            println!();
            println!("Workflow {workflow_id} is waiting for review.");
            println!("Interrupt: {}", request.interrupt_id);
            println!("Resume with: postwright resume {workflow_id} --accept");
        }
        RunOutcome::Scheduled { workflow_id, post } => {
            println!(
                "Workflow {workflow_id} scheduled post {} for {}",
                post.id, post.scheduled_date
            );
        }
        RunOutcome::Aborted { workflow_id } => {
            println!("Workflow {workflow_id} discarded.");
        }
    }
}

fn review_payload(
    response: ResumeArgs,
    date: Option<String>,
    image: Option<String>,
    interrupt_id: Option<String>,
) -> Result<ReviewPayload> {
    let payload = if let Some(raw) = response.json {
        serde_json::from_str(&raw).context("--json is not valid JSON")?
    } else {
        let single = if response.accept {
            RawReviewResponse::accept()
        } else if response.ignore {
            RawReviewResponse::ignore()
        } else if let Some(text) = response.respond {
            RawReviewResponse::respond(&text)
        } else if let Some(post) = response.edit_post {
            RawReviewResponse::edit(&post, date.as_deref(), image.as_deref())
        } else {
            bail!("Choose one of --accept, --ignore, --respond, --edit-post or --json");
        };
        ReviewPayload::Single(single)
    };

    Ok(match (payload, interrupt_id) {
        (ReviewPayload::Single(single), Some(id)) => ReviewPayload::Single(single.for_interrupt(id)),
        (ReviewPayload::Batch(mut batch), Some(id)) => {
            if let Some(first) = batch.first_mut() {
                first.interrupt_id = Some(id);
            }
            ReviewPayload::Batch(batch)
        }
        (payload, _) => payload,
    })
}

async fn serve(config: &Config, services: Services, host: String, port: u16) -> Result<()> {
    let shutdown = CancellationToken::new();

    let publisher_task = match (&services.publisher, config.publisher.enabled) {
        (Some(publisher), true) => Some(tokio::spawn(publisher::scheduler::run(
            Arc::clone(publisher),
            config.publisher.poll_interval_secs,
            shutdown.clone(),
        ))),
        (None, true) => {
            tracing::warn!("publisher.enabled is set but no publisher.command is configured");
            None
        }
        _ => None,
    };

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    let state = AppState {
        workflow: services.workflow,
        posts: Arc::new(services.store),
        publisher: services.publisher,
    };
    info!("Starting postwright gateway on {host}:{port}");
    let served = gateway::run_gateway(&host, port, state, shutdown.clone()).await;

    shutdown.cancel();
    if let Some(task) = publisher_task
        && let Err(e) = task.await
    {
        tracing::warn!("Publisher loop ended abnormally: {e}");
    }
    served
}

pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    let services = build_services(&config).await?;

    match cli.command {
        Commands::Generate { message } => {
            let outcome = services.workflow.start(&message).await?;
            print_outcome(&outcome);
            Ok(())
        }

        Commands::Reviews => {
            let reviews = services.workflow.pending_reviews().await?;
            if reviews.is_empty() {
                println!("No workflows are waiting for review.");
            }
            for review in reviews {
                println!(
                    "{}  {}  (since {})",
                    review.workflow_id, review.topic, review.updated_at
                );
            }
            Ok(())
        }

        Commands::Review { id } => {
            let request = services.workflow.review(&id).await?;
            println!("{}", request.description);
            println!();
            println!("Interrupt: {}", request.interrupt_id);
            Ok(())
        }

        Commands::Resume {
            id,
            response,
            date,
            image,
            interrupt_id,
        } => {
            let payload = review_payload(response, date, image, interrupt_id)?;
            let outcome = services.workflow.resume(&id, payload).await?;
            print_outcome(&outcome);
            Ok(())
        }

        Commands::Posts { status } => {
            let posts = PostStore::list(&services.store, status).await?;
            if posts.is_empty() {
                println!("No posts found.");
                return Ok(());
            }
            let tz = config.timezone();
            for post in posts {
                println!(
                    "{}  [{}]  {}  {}",
                    post.id,
                    post.status,
                    crate::post::schedule::format_date(post.scheduled_date, tz),
                    post.topic
                );
            }
            Ok(())
        }

        Commands::Publish => {
            let Some(publisher) = services.publisher else {
                bail!("No uploader configured. Set [publisher] command in config.toml");
            };
            match publisher.publish_next(Utc::now()).await? {
                PublishOutcome::Idle => println!("No posts are due."),
                PublishOutcome::Uploaded { post } => println!("Uploaded post {}", post.id),
                PublishOutcome::Failed { post_id, error } => {
                    bail!("Upload of {post_id} failed: {error}")
                }
                PublishOutcome::Contended { post_id } => {
                    println!("Post {post_id} is being published elsewhere.");
                }
            }
            Ok(())
        }

        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            serve(&config, services, host, port).await
        }

        Commands::Rules { rules_command } => match rules_command {
            RulesCommands::List { style } => {
                let rules = services.store.fetch_rules(style).await?;
                if rules.is_empty() {
                    println!("No rules for style '{style}'.");
                }
                for (i, rule) in rules.iter().enumerate() {
                    println!("{}. {rule}", i + 1);
                }
                Ok(())
            }
            RulesCommands::Set { style, rules } => {
                services.store.store_rules(style, &rules).await?;
                println!("Stored {} rule(s) for style '{style}'.", rules.len());
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::review::ReviewResponse;

    fn args() -> ResumeArgs {
        ResumeArgs {
            accept: false,
            ignore: false,
            respond: None,
            edit_post: None,
            json: None,
        }
    }

    #[test]
    fn edit_flags_become_edit_response() {
        let response = ResumeArgs {
            edit_post: Some("Fresh text".into()),
            ..args()
        };
        let payload =
            review_payload(response, Some("p1".into()), None, Some("int-1".into())).unwrap();
        let first = payload.into_first().unwrap();
        assert_eq!(first.interrupt_id.as_deref(), Some("int-1"));
        let ReviewResponse::Edit(edit) = first.parse().unwrap() else {
            panic!("expected edit");
        };
        assert_eq!(edit.post.as_deref(), Some("Fresh text"));
        assert_eq!(edit.date.as_deref(), Some("p1"));
    }

    #[test]
    fn raw_json_batch_is_passed_through() {
        let response = ResumeArgs {
            json: Some(r#"[{"type": "response", "args": "shorter"}]"#.into()),
            ..args()
        };
        let payload = review_payload(response, None, None, None).unwrap();
        assert!(matches!(payload, ReviewPayload::Batch(ref b) if b.len() == 1));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let response = ResumeArgs {
            json: Some("{not json".into()),
            ..args()
        };
        assert!(review_payload(response, None, None, None).is_err());
    }
}
