//! Vote session state machine: Idle ⇄ Open.

use tracing::{debug, info};

use crate::classifier::Intent;
use crate::message::InboundMessage;
use crate::poll::announce::Announcements;
use crate::poll::tally::Tally;
use crate::schedule::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
}

/// What happens to earlier votes when a new session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Votes from previous sessions stay until their owner votes again.
    #[default]
    Keep,
    /// Every session starts from an empty tally.
    ClearOnOpen,
}

/// Session state together with the tally it guards.
pub struct VoteSession {
    state: SessionState,
    tally: Tally,
    policy: ResetPolicy,
    announcements: Announcements,
}

impl VoteSession {
    pub fn new(announcements: Announcements, policy: ResetPolicy) -> Self {
        Self {
            state: SessionState::Idle,
            tally: Tally::new(),
            policy,
            announcements,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Apply a scheduler phase. Returns the announcement to send, if any.
    pub fn handle_phase(&mut self, phase: Phase) -> Option<String> {
        match phase {
            Phase::Open => Some(self.open()),
            Phase::Remind => self.remind(),
            Phase::Close => Some(self.close()),
        }
    }

    pub fn open(&mut self) -> String {
        if self.policy == ResetPolicy::ClearOnOpen {
            info!("Clearing {} vote(s) from the previous session", self.tally.len());
            self.tally.clear();
        }
        self.state = SessionState::Open;
        info!("Vote opened ({} vote(s) carried over)", self.tally.len());
        self.announcements.start().to_string()
    }

    /// `None` while idle.
    pub fn remind(&self) -> Option<String> {
        if !self.is_open() {
            debug!("Remind while idle, skipping");
            return None;
        }
        Some(self.announcements.remind().to_string())
    }

    pub fn close(&mut self) -> String {
        self.state = SessionState::Idle;
        info!("Vote closed with {} vote(s)", self.tally.len());
        self.announcements.summary(&self.tally)
    }

    /// Record a vote from `msg`. Returns false when the session is idle.
    pub fn accept(&mut self, msg: &InboundMessage, intent: Intent) -> bool {
        if !self.is_open() {
            return false;
        }
        self.tally.record(msg.sender_id, intent, || msg.display_name());
        info!("Vote from {} ({}): {:?}", msg.display_name(), msg.sender_id, intent);
        true
    }
}
