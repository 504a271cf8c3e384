//! Outbound announcement texts.

use chrono::NaiveTime;

use crate::poll::tally::{ParticipantVote, Tally};

const CLOSE_HEADER: &str = "Too late for the rest...\nHere is the result:\n";

/// Fixed texts for the three phases.
#[derive(Debug, Clone)]
pub struct Announcements {
    start: String,
    remind: String,
}

impl Announcements {
    pub fn new(lunch_time: NaiveTime, remind_lead_minutes: u32) -> Self {
        Self {
            start: format!("Lunch at {}\nthere is time to think", lunch_time.format("%H:%M")),
            remind: format!("Lunch in {remind_lead_minutes} minutes"),
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn remind(&self) -> &str {
        &self.remind
    }

    /// Header followed by one line per participant, in tally order.
    pub fn summary(&self, tally: &Tally) -> String {
        let mut text = String::from(CLOSE_HEADER);
        for (_, vote) in tally.iter() {
            text.push_str(&vote_line(vote));
            text.push('\n');
        }
        text
    }
}

fn vote_line(vote: &ParticipantVote) -> String {
    match (vote.decision, vote.delay_minutes) {
        (true, 0) => format!("{} is coming", vote.display_name),
        (true, delay) => format!("{} will be delayed {} minutes", vote.display_name, delay),
        (false, _) => format!("{} is not coming", vote.display_name),
    }
}
