use serde::{Deserialize, Serialize};

/// Steps of the post workflow.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Node {
    ParseRequest,
    VerifyLinks,
    GenerateReport,
    GeneratePost,
    CondensePost,
    FindImages,
    HumanReview,
    RewritePost,
    UpdateScheduleDate,
    UnknownResponse,
    SchedulePost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    To(Node),
    /// Condense again, go to review, or search images.
    RouteByLength,
    /// Persist and wait for a review response.
    Suspend,
    /// Terminal: the post has been scheduled.
    Finish,
}

impl Node {
    /// The transition table. Review resumption is routed by
    /// [`route_after_review`](super::router::route_after_review).
    pub const fn edge(self) -> Edge {
        match self {
            Self::ParseRequest => Edge::To(Self::VerifyLinks),
            Self::VerifyLinks => Edge::To(Self::GenerateReport),
            Self::GenerateReport => Edge::To(Self::GeneratePost),
            Self::GeneratePost | Self::CondensePost => Edge::RouteByLength,
            Self::FindImages
            | Self::RewritePost
            | Self::UpdateScheduleDate
            | Self::UnknownResponse => Edge::To(Self::HumanReview),
            Self::HumanReview => Edge::Suspend,
            Self::SchedulePost => Edge::Finish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_review_branch_returns_to_review() {
        for node in [
            Node::FindImages,
            Node::RewritePost,
            Node::UpdateScheduleDate,
            Node::UnknownResponse,
        ] {
            assert_eq!(node.edge(), Edge::To(Node::HumanReview), "{node}");
        }
    }

    #[test]
    fn only_review_suspends_and_only_scheduling_finishes() {
        let suspending: Vec<Node> = Node::iter().filter(|n| n.edge() == Edge::Suspend).collect();
        assert_eq!(suspending, vec![Node::HumanReview]);

        let finishing: Vec<Node> = Node::iter().filter(|n| n.edge() == Edge::Finish).collect();
        assert_eq!(finishing, vec![Node::SchedulePost]);
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(Node::UpdateScheduleDate.as_ref(), "update_schedule_date");
        assert_eq!("human_review".parse::<Node>().unwrap(), Node::HumanReview);
        assert_eq!(
            serde_json::to_string(&Node::CondensePost).unwrap(),
            "\"condense_post\""
        );
    }
}
