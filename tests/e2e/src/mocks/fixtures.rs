//! Builders for the record shapes scenarios need, so each test states
//! its setup in one line instead of repeating `RecordInput` literals.

use palace_core::RecordInput;

pub struct RecordFactory;

impl RecordFactory {
    pub fn decision(content: &str, rationale: &str) -> RecordInput {
        RecordInput { content: content.into(), rationale: Some(rationale.into()), ..Default::default() }
    }

    pub fn learning(content: &str) -> RecordInput {
        RecordInput { content: content.into(), kind: Some("learning".into()), ..Default::default() }
    }

    pub fn idea(content: &str) -> RecordInput {
        RecordInput { content: content.into(), kind: Some("idea".into()), ..Default::default() }
    }

    pub fn postmortem(title: &str, what_happened: &str, lessons: &[&str]) -> RecordInput {
        RecordInput {
            content: what_happened.into(),
            title: Some(title.into()),
            what_happened: Some(what_happened.into()),
            lessons_learned: Some(lessons.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_carries_its_rationale() {
        let input = RecordFactory::decision("use sqlite", "embeds cleanly, no server to run");
        assert_eq!(input.content, "use sqlite");
        assert_eq!(input.rationale.as_deref(), Some("embeds cleanly, no server to run"));
    }

    #[test]
    fn learning_is_tagged_with_its_kind() {
        let input = RecordFactory::learning("use exponential backoff");
        assert_eq!(input.kind.as_deref(), Some("learning"));
    }
}
