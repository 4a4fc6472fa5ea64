//! Display-side state of one consumption: pause, byte counts, search.

use crate::cluster::types::{ConsumedMessage, StartOffset};
use crate::consumer::multi_partition::ConsumerEvent;
use crate::error::{KconduitError, Result};

/// `oldest`, `newest`/`latest` (or empty) or a literal offset.
pub fn parse_start_offset(input: &str) -> Result<StartOffset> {
    let input = input.trim();
    match input.to_ascii_lowercase().as_str() {
        "oldest" | "earliest" => Ok(StartOffset::Oldest),
        "" | "newest" | "latest" => Ok(StartOffset::Newest),
        _ => input
            .parse::<i64>()
            .map(StartOffset::Specific)
            .map_err(|_| KconduitError::Validation(format!("invalid offset number: {}", input))),
    }
}

pub fn start_offset_label(start: StartOffset) -> String {
    match start {
        StartOffset::Oldest => "Oldest".to_string(),
        StartOffset::Newest => "Latest".to_string(),
        StartOffset::Specific(offset) => offset.to_string(),
    }
}

/// 1024-based, one decimal above bytes.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, suffix)
}

#[derive(Debug)]
pub struct ConsumerSession {
    topic: String,
    start: StartOffset,
    messages: Vec<ConsumedMessage>,
    total_bytes: u64,
    paused: bool,
    last_error: Option<String>,
    search_term: String,
    search_results: Vec<usize>,
    current_match: usize,
    show_filtered: bool,
}

impl ConsumerSession {
    pub fn new(topic: &str, start: StartOffset) -> Self {
        Self {
            topic: topic.to_string(),
            start,
            messages: Vec::new(),
            total_bytes: 0,
            paused: false,
            last_error: None,
            search_term: String::new(),
            search_results: Vec::new(),
            current_match: 0,
            show_filtered: false,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn start_offset(&self) -> StartOffset {
        self.start
    }

    /// Returns whether a message was appended. Paused sessions drop messages;
    /// errors are always kept as `last_error`.
    pub fn apply(&mut self, event: ConsumerEvent) -> bool {
        match event {
            ConsumerEvent::Error { partition, error, .. } => {
                self.last_error = Some(format!("partition {}: {}", partition, error));
                false
            }
            ConsumerEvent::Message(_) if self.paused => false,
            ConsumerEvent::Message(message) => {
                self.total_bytes += message.size();
                if !self.search_term.is_empty() && matches_term(&message, &self.search_term) {
                    self.search_results.push(self.messages.len());
                }
                self.messages.push(message);
                true
            }
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn messages(&self) -> &[ConsumedMessage] {
        &self.messages
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_bytes = 0;
        self.search_results.clear();
        self.current_match = 0;
        self.show_filtered = false;
    }

    // --- Search ---

    /// Case-insensitive over key, value and topic. Returns the match count.
    pub fn search(&mut self, term: &str) -> usize {
        self.search_term = term.to_string();
        self.current_match = 0;
        self.search_results = if term.is_empty() {
            Vec::new()
        } else {
            self.messages
                .iter()
                .enumerate()
                .filter(|(_, m)| matches_term(m, term))
                .map(|(i, _)| i)
                .collect()
        };
        if self.search_results.is_empty() {
            self.show_filtered = false;
        }
        self.search_results.len()
    }

    pub fn search_results(&self) -> &[usize] {
        &self.search_results
    }

    /// Message index of the current match.
    pub fn current_match(&self) -> Option<usize> {
        self.search_results.get(self.current_match).copied()
    }

    pub fn next_match(&mut self) -> Option<usize> {
        if self.search_results.is_empty() {
            return None;
        }
        self.current_match = (self.current_match + 1) % self.search_results.len();
        self.current_match()
    }

    pub fn previous_match(&mut self) -> Option<usize> {
        if self.search_results.is_empty() {
            return None;
        }
        let len = self.search_results.len();
        self.current_match = (self.current_match + len - 1) % len;
        self.current_match()
    }

    /// Only toggles while there are matches.
    pub fn toggle_filtered(&mut self) -> bool {
        if !self.search_results.is_empty() {
            self.show_filtered = !self.show_filtered;
        }
        self.show_filtered
    }

    pub fn visible_messages(&self) -> Vec<&ConsumedMessage> {
        if self.show_filtered {
            self.search_results.iter().filter_map(|&i| self.messages.get(i)).collect()
        } else {
            self.messages.iter().collect()
        }
    }
}

fn matches_term(message: &ConsumedMessage, term: &str) -> bool {
    let needle = term.to_lowercase();
    message.key_preview().to_lowercase().contains(&needle)
        || message.value_preview().to_lowercase().contains(&needle)
        || message.topic.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;

    fn message(offset: i64, key: &str, value: &str) -> ConsumedMessage {
        ConsumedMessage {
            topic: "orders".to_string(),
            partition: 0,
            offset,
            key: Bytes::copy_from_slice(key.as_bytes()),
            value: Bytes::copy_from_slice(value.as_bytes()),
            timestamp: Utc::now(),
            headers: Default::default(),
        }
    }

    #[test]
    fn start_offset_parsing() {
        assert_eq!(parse_start_offset("oldest").unwrap(), StartOffset::Oldest);
        assert_eq!(parse_start_offset("Latest").unwrap(), StartOffset::Newest);
        assert_eq!(parse_start_offset("").unwrap(), StartOffset::Newest);
        assert_eq!(parse_start_offset(" 42 ").unwrap(), StartOffset::Specific(42));
        assert!(matches!(parse_start_offset("forty"), Err(KconduitError::Validation(_))));
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn paused_session_drops_messages_but_counts_nothing() {
        let mut session = ConsumerSession::new("orders", StartOffset::Oldest);
        assert!(session.apply(ConsumerEvent::Message(message(0, "k", "vv"))));
        session.toggle_pause();
        assert!(!session.apply(ConsumerEvent::Message(message(1, "k", "vv"))));

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.total_bytes(), 3);
    }

    #[test]
    fn search_cycles_through_matches() {
        let mut session = ConsumerSession::new("orders", StartOffset::Oldest);
        session.apply(ConsumerEvent::Message(message(0, "a", "Payment OK")));
        session.apply(ConsumerEvent::Message(message(1, "b", "shipped")));
        session.apply(ConsumerEvent::Message(message(2, "c", "payment failed")));

        assert_eq!(session.search("PAYMENT"), 2);
        assert_eq!(session.current_match(), Some(0));
        assert_eq!(session.next_match(), Some(2));
        assert_eq!(session.next_match(), Some(0));
        assert_eq!(session.previous_match(), Some(2));

        assert!(session.toggle_filtered());
        assert_eq!(session.visible_messages().len(), 2);

        // New arrivals are matched against the active term
        session.apply(ConsumerEvent::Message(message(3, "d", "payment retry")));
        assert_eq!(session.search_results(), &[0, 2, 3]);

        session.clear();
        assert!(session.messages().is_empty());
        assert_eq!(session.total_bytes(), 0);
        assert!(session.search_results().is_empty());
    }

    #[test]
    fn errors_are_kept_aside() {
        let mut session = ConsumerSession::new("orders", StartOffset::Newest);
        let applied = session.apply(ConsumerEvent::Error {
            topic: "orders".to_string(),
            partition: 3,
            error: KconduitError::Rpc("leader not available".to_string()),
        });

        assert!(!applied);
        assert!(session.messages().is_empty());
        assert_eq!(session.last_error(), Some("partition 3: leader not available"));
    }
}
