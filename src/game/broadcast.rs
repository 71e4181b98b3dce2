//! Best-effort fan-out of player-visible text
//!
//! A recipient that cannot be reached is logged and skipped. Delivery
//! failures never reach the caller.

use std::fmt::Display;
use std::sync::Arc;

use tracing::warn;

use crate::world::{Messenger, Participant};

const PREFIX: &str = "TNT Wars: ";

/// Prefix a line with the game tag
pub fn tagged(text: impl Display) -> String {
    format!("{PREFIX}{text}")
}

/// A pending line produced while the session lock is held
#[derive(Debug, Clone)]
pub enum Notice {
    /// Every member of the session
    Session(String),
    /// One participant
    Personal(Arc<Participant>, String),
    /// Everyone on the server
    Global(String),
}

#[derive(Clone)]
pub struct Broadcaster {
    messenger: Arc<dyn Messenger>,
}

impl Broadcaster {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Deliver to one participant; returns whether it arrived
    pub fn to_one(&self, to: &Participant, line: &str) -> bool {
        match self.messenger.send(to, line) {
            Ok(()) => true,
            Err(e) => {
                warn!(participant = %to.id(), error = %e, "Dropped notification");
                false
            }
        }
    }

    /// Deliver to every recipient; returns how many were reached
    pub fn to_all(&self, recipients: &[Arc<Participant>], line: &str) -> usize {
        recipients
            .iter()
            .filter(|p| self.to_one(p, line))
            .count()
    }

    pub fn global(&self, line: &str) -> bool {
        match self.messenger.broadcast_global(line) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Dropped global announcement");
                false
            }
        }
    }

    /// Flush notices collected under the session lock, in order
    pub fn dispatch(&self, recipients: &[Arc<Participant>], notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Session(line) => {
                    self.to_all(recipients, &line);
                }
                Notice::Personal(to, line) => {
                    self.to_one(&to, &line);
                }
                Notice::Global(line) => {
                    self.global(&line);
                }
            }
        }
    }
}
