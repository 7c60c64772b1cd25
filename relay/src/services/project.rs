//! Project service — lifecycle and snapshot hydration.
//!
//! Selecting a project yields a full snapshot that is the sole source of
//! truth for the joining client; the relay never sends diffs against prior
//! client state. Deleting a project destroys its objects and detaches every
//! room member currently viewing it.

use uuid::Uuid;

use events::{ImageObject, ProjectSummary, ServerEvent, TextObject, VoteObject};

use crate::state::{AppState, ProjectState};

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("room not found: {0}")]
    RoomNotFound(Uuid),
    #[error("project not found: {0}")]
    NotFound(Uuid),
}

/// Full object snapshot of one project.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub texts: Vec<TextObject>,
    pub images: Vec<ImageObject>,
    pub votes: Vec<VoteObject>,
}

/// Create a project in a room.
///
/// # Errors
///
/// Returns `RoomNotFound` if the room has no live state.
pub async fn create_project(
    state: &AppState,
    team_id: Uuid,
    name: &str,
) -> Result<ProjectSummary, ProjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ProjectError::RoomNotFound(team_id))?;

    let project_id = Uuid::new_v4();
    room.projects.insert(project_id, ProjectState::named(name));
    tracing::info!(%team_id, %project_id, name, "project created");

    Ok(ProjectSummary { project_id, name: name.to_owned() })
}

/// Rename a project.
///
/// # Errors
///
/// Returns `NotFound` if the project does not exist in the room.
pub async fn rename_project(
    state: &AppState,
    team_id: Uuid,
    project_id: Uuid,
    name: &str,
) -> Result<(), ProjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ProjectError::RoomNotFound(team_id))?;
    let project = room.projects.get_mut(&project_id).ok_or(ProjectError::NotFound(project_id))?;
    project.name = name.to_owned();
    Ok(())
}

/// Delete a project along with all its objects. Clients currently viewing
/// it are detached so later object intents for it fall out of scope.
///
/// # Errors
///
/// Returns `NotFound` if the project does not exist in the room.
pub async fn delete_project(
    state: &AppState,
    team_id: Uuid,
    project_id: Uuid,
) -> Result<(), ProjectError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id).ok_or(ProjectError::RoomNotFound(team_id))?;

    if room.projects.remove(&project_id).is_none() {
        return Err(ProjectError::NotFound(project_id));
    }
    for handle in room.clients.values_mut() {
        if handle.project == Some(project_id) {
            handle.project = None;
        }
    }
    tracing::info!(%team_id, %project_id, "project deleted");
    Ok(())
}

/// Produce the authoritative snapshot for a project join.
///
/// # Errors
///
/// Returns `NotFound` if the project does not exist in the room.
pub async fn snapshot(
    state: &AppState,
    team_id: Uuid,
    project_id: Uuid,
) -> Result<Snapshot, ProjectError> {
    let rooms = state.rooms.read().await;
    let room = rooms.get(&team_id).ok_or(ProjectError::RoomNotFound(team_id))?;
    let project = room.projects.get(&project_id).ok_or(ProjectError::NotFound(project_id))?;

    Ok(Snapshot {
        texts: project.texts.values().cloned().collect(),
        images: project.images.values().cloned().collect(),
        votes: project.votes.values().cloned().collect(),
    })
}

/// Build the `project-init` reply for a snapshot.
#[must_use]
pub fn init_event(project_id: Uuid, snapshot: Snapshot) -> ServerEvent {
    ServerEvent::ProjectInit {
        project_id,
        texts: snapshot.texts,
        images: snapshot.images,
        votes: snapshot.votes,
    }
}

#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
