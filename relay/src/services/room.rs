//! Room service — membership, fan-out, and signaling delivery.
//!
//! DESIGN
//! ======
//! A room is keyed by team id and lives in memory while any client is
//! connected. Broadcast helpers own all fan-out scoping: room-wide events,
//! project-scoped object events, and user-targeted signaling. Sends are
//! best-effort `try_send`; a client with a full channel misses the event and
//! recovers via resync on reconnect.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use events::{Participant, ProjectSummary, ServerEvent};

use crate::state::{AppState, ClientHandle, RoomState};

/// Join a room. Registers the client and returns the current participant
/// roster (including the joiner) and project list.
pub async fn join_room(
    state: &AppState,
    team_id: Uuid,
    user_id: Uuid,
    client_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
) -> (Vec<Participant>, Vec<ProjectSummary>) {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(team_id).or_default();

    room.clients.insert(client_id, ClientHandle { user_id, project: None, tx });
    info!(%team_id, %client_id, clients = room.clients.len(), "client joined room");

    (participants(room), room.project_summaries())
}

/// Leave a room. Returns the departing user id, if the client was known.
/// Evicts the room from memory once the last client leaves.
pub async fn leave_room(state: &AppState, team_id: Uuid, client_id: Uuid) -> Option<Uuid> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&team_id)?;

    let handle = room.clients.remove(&client_id)?;
    info!(%team_id, %client_id, remaining = room.clients.len(), "client left room");

    if room.clients.is_empty() {
        rooms.remove(&team_id);
        info!(%team_id, "evicted room from memory");
    }
    Some(handle.user_id)
}

/// Record which project a client is currently viewing.
pub async fn set_project(state: &AppState, team_id: Uuid, client_id: Uuid, project: Option<Uuid>) {
    let mut rooms = state.rooms.write().await;
    if let Some(room) = rooms.get_mut(&team_id) {
        if let Some(handle) = room.clients.get_mut(&client_id) {
            handle.project = project;
        }
    }
}

/// Broadcast an event to every client in a room, optionally excluding one.
pub async fn broadcast_room(
    state: &AppState,
    team_id: Uuid,
    event: &ServerEvent,
    exclude: Option<Uuid>,
) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&team_id) else {
        return;
    };
    for (client_id, handle) in &room.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        let _ = handle.tx.try_send(event.clone());
    }
}

/// Broadcast an event only to room members currently on the given project.
pub async fn broadcast_project(
    state: &AppState,
    team_id: Uuid,
    project_id: Uuid,
    event: &ServerEvent,
    exclude: Option<Uuid>,
) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&team_id) else {
        return;
    };
    for (client_id, handle) in &room.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        if handle.project != Some(project_id) {
            continue;
        }
        let _ = handle.tx.try_send(event.clone());
    }
}

/// Deliver a signaling event to every connection of one user in a room.
pub async fn send_to_user(state: &AppState, team_id: Uuid, user_id: Uuid, event: &ServerEvent) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&team_id) else {
        return;
    };
    for handle in room.clients.values() {
        if handle.user_id == user_id {
            let _ = handle.tx.try_send(event.clone());
        }
    }
}

/// Distinct participants currently in a room, color-assigned.
fn participants(room: &RoomState) -> Vec<Participant> {
    let mut seen = Vec::new();
    let mut list = Vec::new();
    for handle in room.clients.values() {
        if !seen.contains(&handle.user_id) {
            seen.push(handle.user_id);
            list.push(Participant::new(handle.user_id));
        }
    }
    list.sort_by_key(|p| p.user_id);
    list
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
