//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds a map of live rooms keyed by team id and the in-memory asset store
//! for uploaded image bytes. Each room owns its connected clients and its
//! projects' object collections; the room lock is the single serialization
//! point for everything scoped to that team.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use events::{ImageObject, Node, ProjectSummary, ServerEvent, TextObject, VoteObject};

// =============================================================================
// PROJECT STATE
// =============================================================================

/// Authoritative object collections for one project.
#[derive(Debug, Default)]
pub struct ProjectState {
    pub name: String,
    pub texts: HashMap<Node, TextObject>,
    pub images: HashMap<Node, ImageObject>,
    pub votes: HashMap<Node, VoteObject>,
}

impl ProjectState {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// One connected client inside a room.
#[derive(Debug)]
pub struct ClientHandle {
    pub user_id: Uuid,
    /// Project the client is currently viewing, if any. Object broadcasts
    /// fan out only to clients whose current project matches.
    pub project: Option<Uuid>,
    pub tx: mpsc::Sender<ServerEvent>,
}

/// Per-room (team) live state.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Connected clients keyed by connection id.
    pub clients: HashMap<Uuid, ClientHandle>,
    pub projects: HashMap<Uuid, ProjectState>,
}

impl RoomState {
    #[must_use]
    pub fn project_summaries(&self) -> Vec<ProjectSummary> {
        let mut list: Vec<ProjectSummary> = self
            .projects
            .iter()
            .map(|(project_id, p)| ProjectSummary { project_id: *project_id, name: p.name.clone() })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then(a.project_id.cmp(&b.project_id)));
        list
    }
}

// =============================================================================
// ASSETS
// =============================================================================

/// Uploaded image bytes, addressable by node.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub mime_type: String,
    pub bytes: Bytes,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared relay state. Clone is required by Axum; inner fields are
/// Arc-wrapped.
#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<Uuid, RoomState>>>,
    pub assets: Arc<RwLock<HashMap<Node, StoredAsset>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_state_default_is_empty() {
        let room = RoomState::default();
        assert!(room.clients.is_empty());
        assert!(room.projects.is_empty());
    }

    #[test]
    fn project_summaries_sorted_by_name() {
        let mut room = RoomState::default();
        room.projects.insert(Uuid::new_v4(), ProjectState::named("zebra"));
        room.projects.insert(Uuid::new_v4(), ProjectState::named("apple"));

        let names: Vec<String> = room.project_summaries().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["apple", "zebra"]);
    }
}
