//! Transient feedback messages and their display lifetime.
//!
//! The presenter holds at most one visible [`FeedbackEvent`]. Every issued
//! event gets a fresh [`ExpiryTicket`]; expiring with an outdated ticket is a
//! no-op, so a late timer can never clear a newer message.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default display time for a feedback message.
pub const DEFAULT_FEEDBACK_DURATION: Duration = Duration::from_millis(2000);

// ============================================================================
// Tier and Message
// ============================================================================

/// Quality tier attached to every feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Movement reached its target.
    #[serde(rename = "ok")]
    Ok,
    /// Close to the target but not there yet.
    #[serde(rename = "so-so")]
    SoSo,
    /// Far from the target.
    #[serde(rename = "bad")]
    Bad,
    /// Informational or directive text, not a form judgement.
    #[serde(rename = "info")]
    Info,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::SoSo => write!(f, "so-so"),
            Self::Bad => write!(f, "bad"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A static feedback text with its tier, as emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Text shown to the user.
    pub text: &'static str,
    /// Quality tier.
    pub tier: Tier,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub const fn new(text: &'static str, tier: Tier) -> Self {
        Self { text, tier }
    }
}

// ============================================================================
// FeedbackEvent
// ============================================================================

/// A message issued at a point in session time, visible until it expires or
/// is superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    /// Text shown to the user.
    pub text: String,
    /// Quality tier.
    pub tier: Tier,
    /// Session time (ms) the event was issued.
    pub issued_at_ms: u64,
    /// Session time (ms) the event stops being visible.
    pub expires_at_ms: u64,
}

/// Handle to the expiry of one issued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryTicket {
    /// Monotonically increasing ticket id.
    pub id: u64,
    /// Session time (ms) at which the ticket fires.
    pub expires_at_ms: u64,
}

// ============================================================================
// FeedbackPresenter
// ============================================================================

/// Holds the visible feedback message and decides when it disappears.
#[derive(Debug, Clone)]
pub struct FeedbackPresenter {
    duration_ms: u64,
    active: Option<(ExpiryTicket, FeedbackEvent)>,
    last_ticket: u64,
}

impl Default for FeedbackPresenter {
    fn default() -> Self {
        Self::new(DEFAULT_FEEDBACK_DURATION)
    }
}

impl FeedbackPresenter {
    /// Creates a presenter whose messages stay visible for `duration`.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            active: None,
            last_ticket: 0,
        }
    }

    /// Display duration in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Shows `message`, replacing whatever is visible.
    ///
    /// The previous ticket (if any) is invalidated in the same step.
    pub fn show(&mut self, message: Message, now_ms: u64) -> (FeedbackEvent, ExpiryTicket) {
        self.last_ticket += 1;
        let ticket = ExpiryTicket {
            id: self.last_ticket,
            expires_at_ms: now_ms.saturating_add(self.duration_ms),
        };
        let event = FeedbackEvent {
            text: message.text.to_string(),
            tier: message.tier,
            issued_at_ms: now_ms,
            expires_at_ms: ticket.expires_at_ms,
        };
        self.active = Some((ticket, event.clone()));
        (event, ticket)
    }

    /// The visible event, if any.
    #[must_use]
    pub fn current(&self) -> Option<&FeedbackEvent> {
        self.active.as_ref().map(|(_, event)| event)
    }

    /// Ticket of the visible event, if any.
    #[must_use]
    pub fn pending_ticket(&self) -> Option<ExpiryTicket> {
        self.active.as_ref().map(|(ticket, _)| *ticket)
    }

    /// Fires the ticket with id `ticket_id`.
    ///
    /// Clears the visible event only if it was issued under that ticket.
    /// Returns `true` if something was cleared.
    pub fn expire(&mut self, ticket_id: u64) -> bool {
        match self.active {
            Some((ticket, _)) if ticket.id == ticket_id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Clears the visible event if its expiry time has been reached.
    pub fn expire_due(&mut self, now_ms: u64) -> bool {
        match self.active {
            Some((ticket, _)) if now_ms >= ticket.expires_at_ms => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Clears the visible event and cancels its pending expiry.
    pub fn clear(&mut self) {
        self.active = None;
    }
}
