//! Shared types for the tutor server and its clients.
//!
//! - [`message`]: the chat message record exchanged with the UI.
//! - [`conversation`]: per-session history plus the pending-reply state machine.
//! - [`sse`]: incremental decoder for the `text/event-stream` body produced by
//!   `POST /api/solve`.

pub mod conversation;
pub mod message;
pub mod sse;

pub use conversation::{Conversation, ConversationError, Phase, Ticket, NETWORK_ERROR_MESSAGE};
pub use message::{ChatMessage, Role};
pub use sse::{SseDecoder, SseFrame, DONE_SENTINEL};
