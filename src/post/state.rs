use super::node::Node;
use super::schedule::ScheduleDate;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PostStyle {
    #[default]
    Default,
    News,
    Education,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDocument {
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostImage {
    pub url: String,
    pub mime_type: String,
}

/// What the reviewer decided at the last interrupt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Accept,
    Edit,
    Rewrite { feedback: String },
    UpdateDate { feedback: String },
    Unknown { feedback: String },
    Ignore,
}

/// Working state of one post as it moves through the workflow.
///
/// `topic` is fixed at construction, `links`/`relevant_links` only grow and
/// `condense_count` only increases, so those are reachable through methods
/// alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWorkflowState {
    topic: String,
    pub style: PostStyle,
    links: Vec<String>,
    relevant_links: Vec<String>,
    page_contents: Vec<PageDocument>,
    #[serde(default)]
    pub image_options: Vec<String>,
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub post: String,
    condense_count: u32,
    #[serde(default)]
    pub schedule_date: Option<ScheduleDate>,
    #[serde(default)]
    pub image: Option<PostImage>,
    #[serde(default)]
    pub user_response: Option<String>,
    #[serde(default)]
    pub unknown_response: Option<String>,
    #[serde(default)]
    pub pending_review_decision: Option<ReviewDecision>,
    #[serde(default)]
    pub next_step: Option<Node>,
    #[serde(default)]
    pub object_id: Option<String>,
}

impl PostWorkflowState {
    pub fn new(topic: impl Into<String>, style: PostStyle) -> Self {
        Self {
            topic: topic.into(),
            style,
            links: Vec::new(),
            relevant_links: Vec::new(),
            page_contents: Vec::new(),
            image_options: Vec::new(),
            report: String::new(),
            post: String::new(),
            condense_count: 0,
            schedule_date: None,
            image: None,
            user_response: None,
            unknown_response: None,
            pending_review_decision: None,
            next_step: None,
            object_id: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn relevant_links(&self) -> &[String] {
        &self.relevant_links
    }

    pub fn page_contents(&self) -> &[PageDocument] {
        &self.page_contents
    }

    pub fn condense_count(&self) -> u32 {
        self.condense_count
    }

    /// Appends links not yet present, keeping first-seen order.
    pub fn extend_links<I, S>(&mut self, links: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for link in links {
            let link = link.into();
            if !self.links.contains(&link) {
                self.links.push(link);
            }
        }
    }

    /// Records a verified source. Links outside `links` are refused.
    pub fn add_relevant_source(&mut self, document: PageDocument) -> bool {
        if !self.links.contains(&document.url) {
            return false;
        }
        if !self.relevant_links.contains(&document.url) {
            self.relevant_links.push(document.url.clone());
        }
        if !self.page_contents.iter().any(|d| d.url == document.url) {
            self.page_contents.push(document);
        }
        true
    }

    pub fn add_image_options<I: IntoIterator<Item = String>>(&mut self, urls: I) {
        for url in urls {
            if !self.image_options.contains(&url) {
                self.image_options.push(url);
            }
        }
    }

    /// Replaces the post with a condensed version and counts the pass.
    pub fn record_condensation(&mut self, post: String) {
        self.post = post;
        self.condense_count += 1;
    }

    /// First relevant link, used as the call-to-action link.
    pub fn primary_link(&self) -> &str {
        self.relevant_links
            .first()
            .or_else(|| self.links.first())
            .map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str) -> PageDocument {
        PageDocument {
            url: url.into(),
            content: format!("content of {url}"),
        }
    }

    #[test]
    fn links_are_deduplicated_in_order() {
        let mut state = PostWorkflowState::new("topic", PostStyle::Default);
        state.extend_links(["https://a", "https://b", "https://a"]);
        state.extend_links(vec!["https://c".to_string(), "https://b".to_string()]);
        assert_eq!(state.links(), ["https://a", "https://b", "https://c"]);
    }

    #[test]
    fn relevant_sources_must_be_known_links() {
        let mut state = PostWorkflowState::new("topic", PostStyle::News);
        state.extend_links(["https://a"]);

        assert!(state.add_relevant_source(doc("https://a")));
        assert!(state.add_relevant_source(doc("https://a")));
        assert!(!state.add_relevant_source(doc("https://stranger")));

        assert_eq!(state.relevant_links(), ["https://a"]);
        assert_eq!(state.page_contents().len(), 1);
    }

    #[test]
    fn condensation_increments_count() {
        let mut state = PostWorkflowState::new("topic", PostStyle::Default);
        state.post = "long".into();
        state.record_condensation("short".into());
        state.record_condensation("shorter".into());
        assert_eq!(state.condense_count(), 2);
        assert_eq!(state.post, "shorter");
    }

    #[test]
    fn primary_link_prefers_relevant() {
        let mut state = PostWorkflowState::new("topic", PostStyle::Default);
        assert_eq!(state.primary_link(), "");
        state.extend_links(["https://a", "https://b"]);
        assert_eq!(state.primary_link(), "https://a");
        state.add_relevant_source(doc("https://b"));
        assert_eq!(state.primary_link(), "https://b");
    }

    #[test]
    fn style_parses_loosely() {
        assert_eq!("NEWS".parse::<PostStyle>().unwrap(), PostStyle::News);
        assert!("poetry".parse::<PostStyle>().is_err());
        assert_eq!(PostStyle::Education.to_string(), "education");
    }

    #[test]
    fn state_survives_json_round_trip() {
        let mut state = PostWorkflowState::new("Rust async", PostStyle::Education);
        state.extend_links(["https://tokio.rs"]);
        state.add_relevant_source(doc("https://tokio.rs"));
        state.next_step = Some(Node::RewritePost);
        state.pending_review_decision = Some(ReviewDecision::Rewrite {
            feedback: "shorter".into(),
        });

        let json = serde_json::to_string(&state).unwrap();
        let back: PostWorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
