//! Object service — authoritative canvas object state per project.
//!
//! DESIGN
//! ======
//! The relay is the sole ordering authority for object mutations: intents
//! are applied in arrival order, last write wins, and the resulting state is
//! what gets broadcast. `new` intents assign the canonical node id here.
//! Mutations referencing an unknown node return `Ok(None)` and produce no
//! broadcast — that is an expected race (the object was deleted by another
//! client moments earlier), never an error.
//!
//! Vote tallies are computed here and only here; clients replace their tally
//! wholesale from the `choiceVote` broadcast.

use uuid::Uuid;

use events::{
    Ballot, BoxMove, ImageEvent, ImageObject, Node, ObjectBox, TextEvent, TextObject, VoteEvent,
    VoteObject, tally_from_ballots,
};

use crate::state::{AppState, ProjectState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("room not found: {0}")]
    RoomNotFound(Uuid),
    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),
    #[error("vote requires at least two options")]
    NotEnoughOptions,
}

/// Outcome of a `choice` intent: the authoritative post-event tally.
#[derive(Debug, Clone)]
pub struct ChoiceOutcome {
    pub node: Node,
    pub tally: Vec<u32>,
    pub voter_id: Uuid,
    pub option_index: u32,
}

// Defaults applied when a `new` intent omits presentation fields.
const DEFAULT_TEXT_WIDTH: f64 = 240.0;
const DEFAULT_TEXT_HEIGHT: f64 = 120.0;
const DEFAULT_VOTE_WIDTH: f64 = 260.0;
const DEFAULT_VOTE_HEIGHT: f64 = 180.0;
const DEFAULT_FONT_SIZE: f64 = 16.0;
const DEFAULT_FONT_FAMILY: &str = "sans-serif";
const DEFAULT_TEXT_COLOR: &str = "#222222";

// =============================================================================
// TEXT
// =============================================================================

/// Create a text box from a `new` intent. Assigns the canonical node.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn create_text(
    state: &AppState,
    team_id: Uuid,
    intent: &TextEvent,
) -> Result<TextObject, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let f = &intent.fields;
    let object = TextObject {
        base: ObjectBox {
            node: Uuid::new_v4(),
            project_id: intent.project_id,
            team_id,
            x: f.x.unwrap_or(0.0),
            y: f.y.unwrap_or(0.0),
            width: f.width.unwrap_or(DEFAULT_TEXT_WIDTH),
            height: f.height.unwrap_or(DEFAULT_TEXT_HEIGHT),
            z_index: f.z_index.unwrap_or_else(|| max_z(project) + 1),
        },
        content: f.content.clone().unwrap_or_default(),
        color: f.color.clone().unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_owned()),
        font_size: f.font_size.unwrap_or(DEFAULT_FONT_SIZE),
        font_family: f.font_family.clone().unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_owned()),
    };
    project.texts.insert(object.base.node, object.clone());
    Ok(object)
}

/// Apply a text `update` intent. `None` means the node is unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn update_text(
    state: &AppState,
    team_id: Uuid,
    intent: &TextEvent,
) -> Result<Option<TextObject>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.texts.get_mut(&node)) else {
        return Ok(None);
    };

    let f = &intent.fields;
    apply_box_fields(&mut object.base, f.x, f.y, f.width, f.height, f.z_index);
    if let Some(content) = &f.content {
        object.content.clone_from(content);
    }
    if let Some(color) = &f.color {
        object.color.clone_from(color);
    }
    if let Some(size) = f.font_size {
        object.font_size = size;
    }
    if let Some(family) = &f.font_family {
        object.font_family.clone_from(family);
    }
    Ok(Some(object.clone()))
}

/// Apply a text `move` intent. `None` means the node is unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn move_text(
    state: &AppState,
    team_id: Uuid,
    intent: &TextEvent,
) -> Result<Option<BoxMove>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.texts.get_mut(&node)) else {
        return Ok(None);
    };
    let f = &intent.fields;
    apply_box_fields(&mut object.base, f.x, f.y, f.width, f.height, f.z_index);
    Ok(Some(box_move(&object.base)))
}

/// Apply a text `delete` intent. Returns false if the node was unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn delete_text(
    state: &AppState,
    team_id: Uuid,
    intent: &TextEvent,
) -> Result<bool, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    Ok(intent.node.is_some_and(|node| project.texts.remove(&node).is_some()))
}

// =============================================================================
// IMAGE
// =============================================================================

/// Register an uploaded image as a canvas object. Called by the asset
/// upload route after the bytes are stored, so that upload success and
/// "visible to all clients" stay coupled.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
#[allow(clippy::too_many_arguments)]
pub async fn create_image(
    state: &AppState,
    team_id: Uuid,
    project_id: Uuid,
    owner_user_id: Uuid,
    position: (f64, f64),
    size: (f64, f64),
    file_name: &str,
    mime_type: &str,
) -> Result<ImageObject, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&project_id)
        .ok_or(ObjectError::ProjectNotFound(project_id))?;

    let object = ImageObject {
        base: ObjectBox {
            node: Uuid::new_v4(),
            project_id,
            team_id,
            x: position.0,
            y: position.1,
            width: size.0,
            height: size.1,
            z_index: max_z(project) + 1,
        },
        file_name: file_name.to_owned(),
        mime_type: mime_type.to_owned(),
        owner_user_id,
    };
    project.images.insert(object.base.node, object.clone());
    Ok(object)
}

/// Apply an image `update` intent. Only box fields are mutable; the file
/// reference is fixed at upload time. `None` means the node is unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn update_image(
    state: &AppState,
    team_id: Uuid,
    intent: &ImageEvent,
) -> Result<Option<ImageObject>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.images.get_mut(&node)) else {
        return Ok(None);
    };
    let f = &intent.fields;
    apply_box_fields(&mut object.base, f.x, f.y, f.width, f.height, f.z_index);
    Ok(Some(object.clone()))
}

/// Apply an image `move` intent. `None` means the node is unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn move_image(
    state: &AppState,
    team_id: Uuid,
    intent: &ImageEvent,
) -> Result<Option<BoxMove>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.images.get_mut(&node)) else {
        return Ok(None);
    };
    let f = &intent.fields;
    apply_box_fields(&mut object.base, f.x, f.y, f.width, f.height, f.z_index);
    Ok(Some(box_move(&object.base)))
}

/// Apply an image `delete` intent. Drops the stored asset bytes as well.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn delete_image(
    state: &AppState,
    team_id: Uuid,
    intent: &ImageEvent,
) -> Result<bool, ObjectError> {
    let removed = {
        let mut rooms = state.rooms.write().await;
        let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
        let project = room
            .projects
            .get_mut(&intent.project_id)
            .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;
        intent.node.filter(|node| project.images.remove(node).is_some())
    };

    if let Some(node) = removed {
        state.assets.write().await.remove(&node);
        return Ok(true);
    }
    Ok(false)
}

// =============================================================================
// VOTE
// =============================================================================

/// Create a vote box from a `new` intent. Starts with an empty ballot set
/// and an all-zero tally.
///
/// # Errors
///
/// Returns an error if the room or project is unknown, or if fewer than two
/// options were supplied.
pub async fn create_vote(
    state: &AppState,
    team_id: Uuid,
    intent: &VoteEvent,
) -> Result<VoteObject, ObjectError> {
    let options = intent.fields.options.clone().unwrap_or_default();
    if options.len() < 2 {
        return Err(ObjectError::NotEnoughOptions);
    }

    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let f = &intent.fields;
    let tally = vec![0u32; options.len()];
    let object = VoteObject {
        base: ObjectBox {
            node: Uuid::new_v4(),
            project_id: intent.project_id,
            team_id,
            x: f.x.unwrap_or(0.0),
            y: f.y.unwrap_or(0.0),
            width: f.width.unwrap_or(DEFAULT_VOTE_WIDTH),
            height: f.height.unwrap_or(DEFAULT_VOTE_HEIGHT),
            z_index: f.z_index.unwrap_or_else(|| max_z(project) + 1),
        },
        title: f.title.clone().unwrap_or_default(),
        options,
        tally,
        ballots: Vec::new(),
    };
    project.votes.insert(object.base.node, object.clone());
    Ok(object)
}

/// Apply a vote `update` intent (title/options). Editing options resets
/// ballots and tally: stale selections against a different option list are
/// meaningless.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn update_vote(
    state: &AppState,
    team_id: Uuid,
    intent: &VoteEvent,
) -> Result<Option<VoteObject>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.votes.get_mut(&node)) else {
        return Ok(None);
    };
    let f = &intent.fields;
    apply_box_fields(&mut object.base, f.x, f.y, f.width, f.height, f.z_index);
    if let Some(title) = &f.title {
        object.title.clone_from(title);
    }
    if let Some(options) = &f.options {
        object.options.clone_from(options);
        object.ballots.clear();
        object.tally = vec![0u32; options.len()];
    }
    Ok(Some(object.clone()))
}

/// Apply a vote `move` intent. `None` means the node is unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn move_vote(
    state: &AppState,
    team_id: Uuid,
    intent: &VoteEvent,
) -> Result<Option<BoxMove>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.votes.get_mut(&node)) else {
        return Ok(None);
    };
    let f = &intent.fields;
    apply_box_fields(&mut object.base, f.x, f.y, f.width, f.height, f.z_index);
    Ok(Some(box_move(&object.base)))
}

/// Apply a vote `delete` intent. Returns false if the node was unknown.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn delete_vote(
    state: &AppState,
    team_id: Uuid,
    intent: &VoteEvent,
) -> Result<bool, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    Ok(intent.node.is_some_and(|node| project.votes.remove(&node).is_some()))
}

/// Apply a `choice` intent: replace the voter's ballot (never duplicate),
/// remove it when `option_index == 0`, and recompute the tally.
///
/// # Errors
///
/// Returns an error if the room or project is unknown.
pub async fn choice_vote(
    state: &AppState,
    team_id: Uuid,
    voter_id: Uuid,
    intent: &VoteEvent,
) -> Result<Option<ChoiceOutcome>, ObjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ObjectError::RoomNotFound(team_id))?;
    let project = room
        .projects
        .get_mut(&intent.project_id)
        .ok_or(ObjectError::ProjectNotFound(intent.project_id))?;

    let Some(object) = intent.node.and_then(|node| project.votes.get_mut(&node)) else {
        return Ok(None);
    };

    let option_index = intent.fields.option_index.unwrap_or(0);
    if option_index as usize > object.options.len() {
        // Out-of-range selection is a protocol violation; drop it.
        tracing::warn!(node = %object.base.node, option_index, "choice out of range, ignored");
        return Ok(None);
    }

    object.ballots.retain(|b| b.user_id != voter_id);
    if option_index != 0 {
        object.ballots.push(Ballot { user_id: voter_id, option_index });
    }
    object.tally = tally_from_ballots(&object.ballots, object.options.len());

    Ok(Some(ChoiceOutcome {
        node: object.base.node,
        tally: object.tally.clone(),
        voter_id,
        option_index,
    }))
}

// =============================================================================
// HELPERS
// =============================================================================

/// Highest z-index across all three kinds in a project. The per-project
/// stacking order is one arena shared by text, image, and vote objects.
fn max_z(project: &ProjectState) -> i64 {
    let texts = project.texts.values().map(|o| o.base.z_index);
    let images = project.images.values().map(|o| o.base.z_index);
    let votes = project.votes.values().map(|o| o.base.z_index);
    texts.chain(images).chain(votes).max().unwrap_or(0)
}

fn apply_box_fields(
    base: &mut ObjectBox,
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    z_index: Option<i64>,
) {
    if let Some(x) = x {
        base.x = x;
    }
    if let Some(y) = y {
        base.y = y;
    }
    if let Some(width) = width {
        base.width = width;
    }
    if let Some(height) = height {
        base.height = height;
    }
    if let Some(z) = z_index {
        base.z_index = z;
    }
}

fn box_move(base: &ObjectBox) -> BoxMove {
    BoxMove {
        node: base.node,
        project_id: base.project_id,
        x: base.x,
        y: base.y,
        width: base.width,
        height: base.height,
    }
}

#[cfg(test)]
#[path = "object_test.rs"]
mod tests;
