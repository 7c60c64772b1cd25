//! Typed event taxonomy and JSON text codec.
//!
//! DESIGN
//! ======
//! Events are internally tagged (`"event": "..."`) so the relay can route on
//! a single discriminator without inspecting payload fields. Room and
//! project lifecycle events use kebab-case names (`join-room`, `user-left`),
//! object broadcasts use kind/verb camelCase names (`addTextBox`,
//! `choiceVote`), matching the relay's historical wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::{Fnc, ImageObject, Node, Participant, TextObject, VoteObject, VoteOption};

// =============================================================================
// CODEC
// =============================================================================

/// Error returned by the decode functions.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Encode a client intent as a JSON text frame.
///
/// # Panics
///
/// Never panics in practice; the event types contain no map keys that fail
/// to serialize.
#[must_use]
pub fn encode_client_event(event: &ClientEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// Encode a relay broadcast as a JSON text frame.
#[must_use]
pub fn encode_server_event(event: &ServerEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// Decode a client intent from a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed or unknown events.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a relay broadcast from a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed or unknown events.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// SHARED PAYLOAD SHAPES
// =============================================================================

/// Summary of a project as listed in `room-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_id: Uuid,
    pub name: String,
}

/// Position/size delta carried by `move*` broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxMove {
    pub node: Node,
    pub project_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Sparse text fields. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

/// Sparse image fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
}

/// Sparse vote fields. `option_index` is only meaningful with `fnc: choice`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<VoteOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_index: Option<u32>,
}

/// A text intent: `{fnc, node?, projectId, correlation?, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEvent {
    pub fnc: Fnc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    pub project_id: Uuid,
    /// Client-generated token echoed back in the `addTextBox` confirmation
    /// so the creator can swap its optimistic placeholder deterministically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Uuid>,
    #[serde(flatten)]
    pub fields: TextFields,
}

/// An image intent. Creation happens through the asset upload side-channel,
/// so `fnc: new` never travels on this event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEvent {
    pub fnc: Fnc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    pub project_id: Uuid,
    #[serde(flatten)]
    pub fields: ImageFields,
}

/// A vote intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEvent {
    pub fnc: Fnc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    pub project_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Uuid>,
    #[serde(flatten)]
    pub fields: VoteFields,
}

// =============================================================================
// CLIENT → RELAY
// =============================================================================

/// Intents sent by a client over its room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "join-room")]
    JoinRoom { team_id: Uuid, user_id: Uuid },
    #[serde(rename = "join-project")]
    JoinProject { project_id: Uuid },
    #[serde(rename = "create-project")]
    CreateProject { name: String },
    #[serde(rename = "rename-project")]
    RenameProject { project_id: Uuid, name: String },
    #[serde(rename = "delete-project")]
    DeleteProject { project_id: Uuid },
    TextEvent(TextEvent),
    ImageEvent(ImageEvent),
    VoteEvent(VoteEvent),
    #[serde(rename = "webrtc-offer")]
    WebrtcOffer { to: Uuid, from: Uuid, offer: Value },
    #[serde(rename = "webrtc-answer")]
    WebrtcAnswer { to: Uuid, from: Uuid, answer: Value },
    #[serde(rename = "webrtc-candidate")]
    WebrtcCandidate { to: Uuid, from: Uuid, candidate: Value },
}

// =============================================================================
// RELAY → CLIENT
// =============================================================================

/// Broadcasts and replies fanned out by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "room-info")]
    RoomInfo { participants: Vec<Participant>, projects: Vec<ProjectSummary> },
    #[serde(rename = "user-joined")]
    UserJoined { participant: Participant },
    #[serde(rename = "user-left")]
    UserLeft { user_id: Uuid },

    #[serde(rename = "project-init")]
    ProjectInit {
        project_id: Uuid,
        texts: Vec<TextObject>,
        images: Vec<ImageObject>,
        votes: Vec<VoteObject>,
    },
    #[serde(rename = "project-created")]
    ProjectCreated { project: ProjectSummary },
    #[serde(rename = "project-renamed")]
    ProjectRenamed { project_id: Uuid, name: String },
    #[serde(rename = "project-deleted")]
    ProjectDeleted { project_id: Uuid },

    AddTextBox {
        object: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation: Option<Uuid>,
    },
    UpdateTextBox { object: TextObject },
    MoveTextBox(BoxMove),
    RemoveTextBox { node: Node, project_id: Uuid },

    AddImage {
        object: ImageObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation: Option<Uuid>,
    },
    UpdateImage { object: ImageObject },
    MoveImage(BoxMove),
    RemoveImage { node: Node, project_id: Uuid },

    AddVote {
        object: VoteObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation: Option<Uuid>,
    },
    UpdateVote { object: VoteObject },
    MoveVote(BoxMove),
    RemoveVote { node: Node, project_id: Uuid },
    /// Authoritative ballot outcome. Carries the full post-event tally so
    /// re-application is idempotent; clients replace their tally wholesale.
    ChoiceVote {
        node: Node,
        project_id: Uuid,
        tally: Vec<u32>,
        voter_id: Uuid,
        option_index: u32,
    },

    #[serde(rename = "webrtc-offer")]
    WebrtcOffer { to: Uuid, from: Uuid, offer: Value },
    #[serde(rename = "webrtc-answer")]
    WebrtcAnswer { to: Uuid, from: Uuid, answer: Value },
    #[serde(rename = "webrtc-candidate")]
    WebrtcCandidate { to: Uuid, from: Uuid, candidate: Value },

    Error { message: String },
}

impl ServerEvent {
    /// Project scope of an object broadcast, if any. Used by the relay to
    /// restrict fan-out to room members currently on that project.
    #[must_use]
    pub fn project_scope(&self) -> Option<Uuid> {
        match self {
            Self::AddTextBox { object, .. } | Self::UpdateTextBox { object } => {
                Some(object.base.project_id)
            }
            Self::AddImage { object, .. } | Self::UpdateImage { object } => {
                Some(object.base.project_id)
            }
            Self::AddVote { object, .. } | Self::UpdateVote { object } => {
                Some(object.base.project_id)
            }
            Self::MoveTextBox(mv) | Self::MoveImage(mv) | Self::MoveVote(mv) => {
                Some(mv.project_id)
            }
            Self::RemoveTextBox { project_id, .. }
            | Self::RemoveImage { project_id, .. }
            | Self::RemoveVote { project_id, .. }
            | Self::ChoiceVote { project_id, .. }
            | Self::ProjectInit { project_id, .. } => Some(*project_id),
            _ => None,
        }
    }
}

// =============================================================================
// CURSOR (peer data channel, not relayed)
// =============================================================================

/// High-frequency cursor broadcast carried on the peer data channel.
/// Best-effort and lossy; the latest message per peer wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMsg {
    pub user_id: Uuid,
    pub x: f64,
    pub y: f64,
}
