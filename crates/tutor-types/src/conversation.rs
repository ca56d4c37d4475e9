//! Conversation history and the pending-reply state machine.
//!
//! A request moves through
//! `Idle → Sending → Thinking → Streaming → Settled | Errored`.
//! Every request is tagged with a [`Ticket`] carrying the generation it was
//! submitted in.  [`Conversation::clear`] bumps the generation, so events that
//! arrive for a request started before the clear are dropped instead of being
//! appended to the fresh conversation.

use strum::Display;
use thiserror::Error;

use crate::message::ChatMessage;

/// Assistant message substituted when the request fails on the client side.
pub const NETWORK_ERROR_MESSAGE: &str = "エラーが発生しました。もう一度お試しください。";

/// Lifecycle of the most recent request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Nothing submitted yet (or cleared).
    #[default]
    Idle,
    /// Request sent, no response headers yet.
    Sending,
    /// Response accepted, no chunk received yet.
    Thinking,
    /// Chunks arriving.
    Streaming,
    /// Stream closed; reply moved into history.
    Settled,
    /// Request failed; error text moved into history.
    Errored,
}

impl Phase {
    /// `true` while a request owns the pending slot.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Sending | Phase::Thinking | Phase::Streaming)
    }
}

/// Handle identifying one submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("a request is already in flight")]
    Busy,
}

#[derive(Debug, Default)]
pub struct Conversation {
    history: Vec<ChatMessage>,
    pending: String,
    phase: Phase,
    generation: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Text accumulated for the in-flight reply, if any.
    pub fn pending(&self) -> Option<&str> {
        self.phase().is_in_flight().then_some(self.pending.as_str())
    }

    /// Record a user question and open a pending reply for it.
    pub fn submit(&mut self, question: &str) -> Result<Ticket, ConversationError> {
        if question.trim().is_empty() {
            return Err(ConversationError::EmptyQuestion);
        }
        if self.phase().is_in_flight() {
            return Err(ConversationError::Busy);
        }

        self.history.push(ChatMessage::user(question));
        self.pending.clear();
        self.phase = Phase::Sending;
        Ok(Ticket {
            generation: self.generation,
        })
    }

    /// The server accepted the request; waiting for the first chunk.
    pub fn response_started(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) || self.phase() != Phase::Sending {
            return false;
        }
        self.phase = Phase::Thinking;
        true
    }

    /// Append a streamed fragment verbatim to the pending reply.
    pub fn push_chunk(&mut self, ticket: Ticket, text: &str) -> bool {
        if !self.is_current(ticket) || !self.phase().is_in_flight() {
            return false;
        }
        self.pending.push_str(text);
        self.phase = Phase::Streaming;
        true
    }

    /// The stream closed normally; move the pending reply into history.
    ///
    /// An empty reply settles without adding an assistant message.
    pub fn finish(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) || !self.phase().is_in_flight() {
            return false;
        }
        let reply = std::mem::take(&mut self.pending);
        if !reply.is_empty() {
            self.history.push(ChatMessage::assistant(reply));
        }
        self.phase = Phase::Settled;
        true
    }

    /// The request failed; substitute the generic error text as the reply.
    pub fn fail(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) || !self.phase().is_in_flight() {
            return false;
        }
        self.pending.clear();
        self.history.push(ChatMessage::assistant(NETWORK_ERROR_MESSAGE));
        self.phase = Phase::Errored;
        true
    }

    /// Drop history and pending state.  In-flight tickets become stale.
    pub fn clear(&mut self) {
        self.history.clear();
        self.pending.clear();
        self.phase = Phase::Idle;
        self.generation = self.generation.wrapping_add(1);
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::Role;

    #[test]
    fn full_lifecycle_settles_reply_into_history() {
        let mut conv = Conversation::new();
        let ticket = conv.submit("2x+3=7を解け").unwrap();
        assert_eq!(conv.phase(), Phase::Sending);

        assert!(conv.response_started(ticket));
        assert_eq!(conv.phase(), Phase::Thinking);
        assert_eq!(conv.pending(), Some(""));

        assert!(conv.push_chunk(ticket, "#### 問題文"));
        assert!(conv.push_chunk(ticket, "の要約\n"));
        assert_eq!(conv.phase(), Phase::Streaming);
        assert_eq!(conv.pending(), Some("#### 問題文の要約\n"));

        assert!(conv.finish(ticket));
        assert_eq!(conv.phase(), Phase::Settled);
        assert_eq!(conv.pending(), None);
        assert_eq!(conv.history().len(), 2);
        assert_eq!(conv.history()[1].role, Role::Assistant);
        assert_eq!(conv.history()[1].content, "#### 問題文の要約\n");
    }

    #[test]
    fn empty_question_is_rejected() {
        let mut conv = Conversation::new();
        assert_eq!(conv.submit("  \n\t"), Err(ConversationError::EmptyQuestion));
        assert!(conv.history().is_empty());
        assert_eq!(conv.phase(), Phase::Idle);
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let mut conv = Conversation::new();
        let _ticket = conv.submit("first").unwrap();
        assert_eq!(conv.submit("second"), Err(ConversationError::Busy));
        assert_eq!(conv.history().len(), 1);
    }

    #[test]
    fn failure_substitutes_error_message_and_conversation_continues() {
        let mut conv = Conversation::new();
        let ticket = conv.submit("q1").unwrap();
        conv.response_started(ticket);
        conv.push_chunk(ticket, "partial");
        assert!(conv.fail(ticket));
        assert_eq!(conv.phase(), Phase::Errored);
        assert_eq!(conv.history()[1].content, NETWORK_ERROR_MESSAGE);

        let next = conv.submit("q2").unwrap();
        assert!(conv.push_chunk(next, "ok"));
        assert!(conv.finish(next));
        assert_eq!(conv.history().len(), 4);
    }

    #[test]
    fn clear_mid_stream_drops_stale_events() {
        let mut conv = Conversation::new();
        let stale = conv.submit("q").unwrap();
        conv.response_started(stale);
        conv.push_chunk(stale, "abc");

        conv.clear();
        assert_eq!(conv.phase(), Phase::Idle);
        assert!(conv.history().is_empty());

        assert!(!conv.push_chunk(stale, "def"));
        assert!(!conv.finish(stale));
        assert!(!conv.fail(stale));
        assert!(conv.history().is_empty());

        // A new request after the clear is unaffected by the stale one.
        let fresh = conv.submit("q2").unwrap();
        assert!(!conv.push_chunk(stale, "late"));
        assert!(conv.push_chunk(fresh, "new"));
        assert_eq!(conv.pending(), Some("new"));
    }

    #[test]
    fn empty_stream_settles_without_assistant_message() {
        let mut conv = Conversation::new();
        let ticket = conv.submit("q").unwrap();
        conv.response_started(ticket);
        assert!(conv.finish(ticket));
        assert_eq!(conv.history().len(), 1);
        assert_eq!(conv.phase(), Phase::Settled);
    }

    #[test]
    fn events_after_settle_are_ignored() {
        let mut conv = Conversation::new();
        let ticket = conv.submit("q").unwrap();
        conv.push_chunk(ticket, "a");
        conv.finish(ticket);
        assert!(!conv.push_chunk(ticket, "b"));
        assert!(!conv.finish(ticket));
        assert_eq!(conv.history()[1].content, "a");
    }
}
