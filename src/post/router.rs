use super::node::Node;
use super::state::PostWorkflowState;
use super::text::post_length;
use crate::config::WorkflowConfig;

/// Decides what follows drafting or a condensation pass, first match wins:
/// the condense budget is spent, the post is still too long, text-only mode
/// skips images, otherwise look for images.
pub fn decide_after_condense(state: &PostWorkflowState, config: &WorkflowConfig) -> Node {
    if state.condense_count() >= config.max_condense_count {
        return Node::HumanReview;
    }
    if post_length(&state.post) > config.max_post_length {
        return Node::CondensePost;
    }
    if config.text_only_mode {
        return Node::HumanReview;
    }
    Node::FindImages
}

/// Consumes the routing hint left by review resolution.
pub fn route_after_review(state: &mut PostWorkflowState) -> Node {
    state.pending_review_decision = None;
    state.next_step.take().unwrap_or(Node::HumanReview)
}
