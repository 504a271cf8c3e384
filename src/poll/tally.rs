//! Per-participant votes.

use std::collections::HashMap;

use crate::classifier::Intent;

/// One participant's current answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantVote {
    pub decision: bool,
    /// Minutes late. Only meaningful when `decision` is true.
    pub delay_minutes: u32,
    /// Captured on the first vote and never refreshed.
    pub display_name: String,
}

impl Default for ParticipantVote {
    fn default() -> Self {
        Self {
            decision: false,
            delay_minutes: 0,
            display_name: "Anon".to_string(),
        }
    }
}

/// All votes seen since the process started, keyed by participant id.
#[derive(Debug, Default)]
pub struct Tally {
    votes: HashMap<i64, ParticipantVote>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a vote. Last vote wins; `display_name` is only called for new participants.
    pub fn record<F>(&mut self, participant_id: i64, intent: Intent, display_name: F)
    where
        F: FnOnce() -> String,
    {
        let (decision, delay_minutes) = match intent {
            Intent::Yes { delay_minutes } => (true, delay_minutes),
            Intent::No => (false, 0),
        };

        let vote = self
            .votes
            .entry(participant_id)
            .or_insert_with(|| ParticipantVote {
                display_name: display_name(),
                ..Default::default()
            });
        vote.decision = decision;
        vote.delay_minutes = delay_minutes;
    }

    pub fn get(&self, participant_id: i64) -> Option<&ParticipantVote> {
        self.votes.get(&participant_id)
    }

    /// Iterates in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&i64, &ParticipantVote)> {
        self.votes.iter()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_vote_creates_record() {
        let mut tally = Tally::new();
        tally.record(1, Intent::Yes { delay_minutes: 5 }, || "Ann Lee".to_string());

        let vote = tally.get(1).unwrap();
        assert!(vote.decision);
        assert_eq!(vote.delay_minutes, 5);
        assert_eq!(vote.display_name, "Ann Lee");
        assert_eq!(tally.len(), 1);
    }

    #[test]
    fn test_last_vote_wins() {
        let mut tally = Tally::new();
        tally.record(1, Intent::Yes { delay_minutes: 0 }, || "Ann".to_string());
        tally.record(1, Intent::No, || "Ann".to_string());

        assert!(!tally.get(1).unwrap().decision);
        assert_eq!(tally.len(), 1);
    }

    #[test]
    fn test_no_resets_delay() {
        let mut tally = Tally::new();
        tally.record(1, Intent::Yes { delay_minutes: 15 }, || "Ann".to_string());
        tally.record(1, Intent::No, || "Ann".to_string());
        assert_eq!(tally.get(1).unwrap().delay_minutes, 0);
    }

    #[test]
    fn test_name_not_refreshed() {
        let mut tally = Tally::new();
        tally.record(1, Intent::No, || "Old Name".to_string());
        tally.record(1, Intent::Yes { delay_minutes: 0 }, || panic!("name computed for existing participant"));
        assert_eq!(tally.get(1).unwrap().display_name, "Old Name");
    }

    #[test]
    fn test_clear() {
        let mut tally = Tally::new();
        tally.record(1, Intent::No, || "A".to_string());
        tally.record(2, Intent::No, || "B".to_string());
        assert_eq!(tally.len(), 2);
        tally.clear();
        assert!(tally.is_empty());
    }
}
