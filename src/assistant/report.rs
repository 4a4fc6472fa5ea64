//! Plain-text rendering of interpreter results for the operator.

use std::fmt::Write;

use crate::assistant::executor::{BatchResult, StepOutcome};
use crate::assistant::interpreter::Execution;
use crate::cluster::types::TopicInfo;
use crate::error::Result;
use crate::groups::ConsumerGroupSnapshot;

const MAX_LISTED_TOPICS: usize = 5;

/// A topic that passed a `query_topics` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMatch {
    pub topic: TopicInfo,
    /// Raw `compression.type`, only looked up when the filter asked for it.
    pub compression: Option<String>,
}

pub fn render(result: &Result<Execution>) -> String {
    match result {
        Ok(Execution::Single { outcome, .. }) => render_outcome(outcome),
        Ok(Execution::Batch(batch)) => render_batch(batch),
        Err(e) if e.is_nothing_to_do() => "No actions were executed".to_string(),
        Err(e) => format!("Error: {}", e),
    }
}

pub fn render_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Success(message) => message.clone(),
        StepOutcome::Failure(reason) => format!("Failed: {}", reason),
    }
}

/// One `Step i: ...` line per step, 1-based.
pub fn render_batch(batch: &BatchResult) -> String {
    if batch.is_empty() {
        return "No actions were executed".to_string();
    }
    batch
        .steps()
        .iter()
        .map(|step| format!("Step {}: {}", step.step_index + 1, render_outcome(&step.outcome)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_groups(groups: &[ConsumerGroupSnapshot]) -> String {
    if groups.is_empty() {
        return "No consumer groups found matching the criteria.".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Found {} consumer group(s):\n", groups.len());
    for group in groups {
        let _ = writeln!(out, "Group: {}", group.group_id);
        let _ = writeln!(out, "   - State: {}", group.state);
        let _ = writeln!(out, "   - Members: {}", group.members.len());
        let _ = writeln!(out, "   - Topics: {}", group.topics_count());
        let _ = writeln!(out, "   - Total Lag: {}", group.total_lag);

        let topics: Vec<&str> = group.subscribed_topics.iter().map(String::as_str).collect();
        if !topics.is_empty() && topics.len() <= MAX_LISTED_TOPICS {
            let _ = writeln!(out, "   - Consuming: {}", topics.join(", "));
        } else if topics.len() > MAX_LISTED_TOPICS {
            let _ = writeln!(
                out,
                "   - Consuming: {}, ... ({} total)",
                topics[..MAX_LISTED_TOPICS].join(", "),
                topics.len()
            );
        }
        out.push('\n');
    }
    out
}

pub fn render_topics(topics: &[TopicMatch]) -> String {
    if topics.is_empty() {
        return "No topics found matching the criteria.".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Found {} topic(s) matching criteria:\n", topics.len());
    for m in topics {
        let _ = writeln!(out, "Topic: {}", m.topic.name);
        let _ = writeln!(out, "   - Partitions: {}", m.topic.partitions);
        let _ = writeln!(out, "   - Replication Factor: {}", m.topic.replication_factor);
        if let Some(compression) = &m.compression {
            match compression.as_str() {
                "" | "producer" => {
                    let _ = writeln!(out, "   - Compression: none (using producer default)");
                }
                codec => {
                    let _ = writeln!(out, "   - Compression: {}", codec);
                }
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::types::GroupState;
    use std::collections::BTreeSet;

    #[test]
    fn long_topic_lists_are_truncated() {
        let group = ConsumerGroupSnapshot {
            group_id: "billing".to_string(),
            state: GroupState::Stable,
            members: vec!["m-1".to_string()],
            subscribed_topics: (1..=7).map(|i| format!("t{}", i)).collect::<BTreeSet<_>>(),
            total_lag: 42,
        };

        let text = render_groups(&[group]);

        assert!(text.contains("   - Total Lag: 42"));
        assert!(text.contains("   - Consuming: t1, t2, t3, t4, t5, ... (7 total)"));
    }

    #[test]
    fn producer_default_compression_reads_as_none() {
        let m = TopicMatch {
            topic: TopicInfo { name: "events".to_string(), partitions: 3, replication_factor: 1 },
            compression: Some("producer".to_string()),
        };

        assert!(render_topics(&[m]).contains("Compression: none (using producer default)"));
        assert_eq!(render_topics(&[]), "No topics found matching the criteria.");
    }
}
