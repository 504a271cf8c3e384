//! Shared bot state: one session behind one lock, fed by the scheduler and the chat.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::message::InboundMessage;
use crate::poll::{SessionState, VoteSession};
use crate::schedule::Phase;

pub struct PollBot {
    session: Mutex<VoteSession>,
    classifier: Classifier,
    /// Announcements waiting to be sent. Drained by a separate task so
    /// a slow Telegram call never holds up the scheduler.
    outbox: mpsc::UnboundedSender<String>,
}

impl PollBot {
    pub fn new(session: VoteSession, classifier: Classifier, outbox: mpsc::UnboundedSender<String>) -> Self {
        Self {
            session: Mutex::new(session),
            classifier,
            outbox,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn handle_phase(&self, phase: Phase) {
        info!("⏰ Phase {}", phase);
        let announcement = {
            let mut session = self.session.lock().await;
            session.handle_phase(phase)
        };
        if let Some(text) = announcement {
            self.announce(text);
        }
    }

    /// Returns true when the message changed the tally.
    pub async fn handle_message(&self, msg: &InboundMessage) -> bool {
        let Some(intent) = self.classifier.classify(msg) else {
            return false;
        };
        let accepted = self.session.lock().await.accept(msg, intent);
        if !accepted {
            debug!("Vote from {} while idle, ignored", msg.sender_id);
        }
        accepted
    }

    /// Apply phases from the scheduler until it stops.
    pub fn spawn_phase_listener(self: Arc<Self>, mut phases: mpsc::UnboundedReceiver<Phase>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(phase) = phases.recv().await {
                self.handle_phase(phase).await;
            }
            warn!("Scheduler channel closed");
        })
    }

    fn announce(&self, text: String) {
        if self.outbox.send(text).is_err() {
            warn!("Announcement dropped: no outbound sender");
        }
    }
}
