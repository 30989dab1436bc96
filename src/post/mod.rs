//! The post workflow: request parsing through human review to a scheduled
//! record.

pub mod images;
pub mod machine;
pub mod node;
pub mod nodes;
pub mod review;
pub mod router;
pub mod schedule;
pub mod state;
pub mod text;

pub use machine::{PendingReview, PostWorkflow, RunOutcome};
pub use node::{Edge, Node};
pub use nodes::WorkflowDeps;
pub use review::{RawReviewResponse, ReviewPayload, ReviewRequest};
pub use schedule::{Priority, ScheduleDate};
pub use state::{PageDocument, PostImage, PostStyle, PostWorkflowState, ReviewDecision};
