//! Shared event model for the `TeamCanvas` realtime wire protocol.
//!
//! This crate owns the wire representation used by both `relay` and `client`:
//! the canvas object model (text, image, vote), the participant model, and
//! the typed event taxonomy exchanged over the room WebSocket. Events are
//! encoded as internally-tagged JSON text frames (`"event": "..."`).
//!
//! DESIGN
//! ======
//! - One channel per room (team); events carry `projectId` where the relay
//!   needs to scope fan-out to room members currently on that project.
//! - Object intents are namespaced by kind (`textEvent`, `imageEvent`,
//!   `voteEvent`) and carry an `fnc` discriminator.
//! - WebRTC signaling payloads are opaque `serde_json::Value` blobs, relayed
//!   verbatim without interpretation.

mod event;
mod model;

pub use event::{
    BoxMove, ClientEvent, CodecError, CursorMsg, ImageEvent, ImageFields, ProjectSummary,
    ServerEvent, TextEvent, TextFields, VoteEvent, VoteFields, decode_client_event,
    decode_server_event, encode_client_event, encode_server_event,
};
pub use model::{
    Ballot, Fnc, ImageObject, Node, ObjectBox, Participant, TextObject, VoteObject, VoteOption,
    participant_color, tally_from_ballots,
};

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
