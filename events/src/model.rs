//! Canvas object and participant models shared across the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable relay-assigned identifier of a canvas object, unique within a
/// project. Clients hold a locally-generated placeholder until the relay
/// confirms a creation intent.
pub type Node = Uuid;

// =============================================================================
// OBJECT BASE
// =============================================================================

/// Fields common to all three object kinds. Flattened into each object on
/// the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectBox {
    pub node: Node,
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Stacking order; monotonically increasing per project across all
    /// object kinds. Lower values are drawn beneath higher values.
    pub z_index: i64,
}

// =============================================================================
// OBJECT KINDS
// =============================================================================

/// A text box on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextObject {
    #[serde(flatten)]
    pub base: ObjectBox,
    pub content: String,
    pub color: String,
    pub font_size: f64,
    pub font_family: String,
}

/// An image box. The bytes are not part of synchronized state; the
/// `{node, projectId, teamId}` triple is the out-of-band fetch key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageObject {
    #[serde(flatten)]
    pub base: ObjectBox,
    pub file_name: String,
    pub mime_type: String,
    pub owner_user_id: Uuid,
}

/// One selectable option within a vote box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub content: String,
}

/// A single user's current selection within a vote. `option_index == 0`
/// means "no selection"; options themselves are addressed 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub user_id: Uuid,
    pub option_index: u32,
}

/// A poll/vote box. The tally is authoritative from the relay; clients
/// never compute it locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteObject {
    #[serde(flatten)]
    pub base: ObjectBox,
    pub title: String,
    pub options: Vec<VoteOption>,
    /// `tally[i]` equals the count of ballots with `option_index == i + 1`.
    pub tally: Vec<u32>,
    /// At most one ballot per user.
    pub ballots: Vec<Ballot>,
}

/// Compute the authoritative tally for a set of ballots.
#[must_use]
pub fn tally_from_ballots(ballots: &[Ballot], option_count: usize) -> Vec<u32> {
    let mut tally = vec![0u32; option_count];
    for ballot in ballots {
        if ballot.option_index >= 1 {
            let slot = (ballot.option_index - 1) as usize;
            if let Some(count) = tally.get_mut(slot) {
                *count += 1;
            }
        }
    }
    tally
}

// =============================================================================
// FNC DISCRIMINATOR
// =============================================================================

/// Operation discriminator on object intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fnc {
    New,
    Update,
    Move,
    Delete,
    /// Vote-only: cast, change, or retract a ballot.
    Choice,
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// A room member as seen by every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: Uuid,
    /// Deterministic function of `user_id`, stable for the whole session.
    pub color: String,
}

impl Participant {
    #[must_use]
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, color: participant_color(user_id).to_owned() }
    }
}

/// Cursor/avatar palette. Index is a stable hash of the user id, so the
/// relay and every client agree on a user's color without coordination.
const PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#008080",
];

/// Assign a participant color. FNV-1a over the raw id bytes.
#[must_use]
pub fn participant_color(user_id: Uuid) -> &'static str {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in user_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    #[allow(clippy::cast_possible_truncation)]
    PALETTE[(hash % PALETTE.len() as u64) as usize]
}
