use crate::post::PostStyle;
use crate::store::PostStatus;
use clap::{Args, Parser, Subcommand};

/// `postwright` - research, draft, review and schedule social posts.
#[derive(Parser, Debug)]
#[command(name = "postwright")]
#[command(version)]
#[command(about = "Turn a request into a reviewed, scheduled LinkedIn post.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a post workflow from a free-text request
    Generate {
        /// Request, e.g. "write a news post about https://..."
        #[arg(short, long)]
        message: String,
    },

    /// List workflows waiting for review
    Reviews,

    /// Show the review request of a suspended workflow
    Review {
        /// Workflow id
        id: String,
    },

    /// Answer a suspended workflow's review
    Resume {
        /// Workflow id
        id: String,

        #[command(flatten)]
        response: ResumeArgs,

        /// With --edit-post: `MM/dd/yyyy hh:mm AM ZONE` or p1|p2|p3
        #[arg(long, requires = "edit_post")]
        date: Option<String>,

        /// With --edit-post: image URL, or `remove`
        #[arg(long, requires = "edit_post")]
        image: Option<String>,

        /// Only accept the response if the workflow still waits on this interrupt
        #[arg(long)]
        interrupt_id: Option<String>,
    },

    /// List scheduled posts
    Posts {
        /// Filter by status (pending, queued, uploaded)
        #[arg(long)]
        status: Option<PostStatus>,
    },

    /// Publish the next due post now
    Publish,

    /// Start the HTTP gateway (and the publisher loop when enabled)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage per-style writing rules
    Rules {
        #[command(subcommand)]
        rules_command: RulesCommands,
    },
}

/// Exactly one way of answering a review.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct ResumeArgs {
    /// Schedule the post as shown
    #[arg(long)]
    pub accept: bool,

    /// Discard the post
    #[arg(long)]
    pub ignore: bool,

    /// Free-text feedback ("make it shorter", "post it Monday")
    #[arg(long, value_name = "TEXT")]
    pub respond: Option<String>,

    /// Replacement post text, then schedule
    #[arg(long, value_name = "TEXT")]
    pub edit_post: Option<String>,

    /// Raw response JSON (object or list)
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RulesCommands {
    /// Show the rules for a style
    List {
        #[arg(long, default_value = "default")]
        style: PostStyle,
    },
    /// Replace the rules for a style
    Set {
        #[arg(long, default_value = "default")]
        style: PostStyle,
        /// Rules, one per argument; none clears the list
        rules: Vec<String>,
    },
}
