//! Session — the single-threaded hub tying store, mesh, cursors, and media
//! to the transport.
//!
//! DESIGN
//! ======
//! `handle_event` consumes one decoded [`ServerEvent`] and returns the
//! intents that must go out in response (signaling answers, mostly). All
//! engine state lives behind `&mut self`; there is no shared-memory
//! concurrency anywhere in this crate. The transport task feeds events in
//! and writes the returned intents out.
//!
//! Project scoping: `join_project` switches `current_project` immediately,
//! so an object broadcast for the previous project that was already in
//! flight is dropped here rather than applied to the freshly loading store.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use events::{ClientEvent, Participant, ProjectSummary, ServerEvent, TextFields, VoteFields,
    VoteOption};

use crate::cursor::CursorMap;
use crate::media::{CallError, MediaCall};
use crate::mesh::{LinkDriver, LinkEvent, MeshEffect, PeerMesh};
use crate::store::{ObjectKind, ObjectStore};
use crate::zorder::FocusController;

pub struct Session<D: LinkDriver> {
    team_id: Uuid,
    user_id: Uuid,
    current_project: Option<Uuid>,

    pub roster: HashMap<Uuid, Participant>,
    pub projects: Vec<ProjectSummary>,
    pub store: ObjectStore,
    pub focus: FocusController,
    pub cursors: CursorMap,
    pub mesh: PeerMesh<D>,
    pub media: MediaCall,
}

impl<D: LinkDriver> Session<D> {
    pub fn new(team_id: Uuid, user_id: Uuid, driver: D) -> Self {
        Self {
            team_id,
            user_id,
            current_project: None,
            roster: HashMap::new(),
            projects: Vec::new(),
            store: ObjectStore::new(team_id, user_id),
            focus: FocusController::new(),
            cursors: CursorMap::new(),
            mesh: PeerMesh::new(user_id, driver),
            media: MediaCall::new(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    #[must_use]
    pub fn current_project(&self) -> Option<Uuid> {
        self.current_project
    }

    // =========================================================================
    // OUTBOUND INTENTS
    // =========================================================================

    /// The `join-room` announcement, also re-sent by the transport after a
    /// reconnect.
    #[must_use]
    pub fn join_room_event(&self) -> ClientEvent {
        ClientEvent::JoinRoom { team_id: self.team_id, user_id: self.user_id }
    }

    /// Switch projects. Scoping flips immediately; the store resets when
    /// the authoritative snapshot (`project-init`) arrives.
    pub fn join_project(&mut self, project_id: Uuid) -> ClientEvent {
        self.current_project = Some(project_id);
        self.store.reset();
        self.focus.blur();
        ClientEvent::JoinProject { project_id }
    }

    pub fn create_text(&mut self, x: f64, y: f64, content: &str) -> Option<ClientEvent> {
        self.store.create_text(x, y, content)
    }

    pub fn create_vote(
        &mut self,
        x: f64,
        y: f64,
        title: &str,
        options: Vec<VoteOption>,
    ) -> Option<ClientEvent> {
        self.store.create_vote(x, y, title, options)
    }

    pub fn update_text(&mut self, node: Uuid, fields: TextFields) -> Option<ClientEvent> {
        self.store.update_text(node, fields)
    }

    pub fn update_vote(&mut self, node: Uuid, fields: VoteFields) -> Option<ClientEvent> {
        self.store.update_vote(node, fields)
    }

    pub fn move_resize(
        &mut self,
        kind: ObjectKind,
        node: Uuid,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Option<ClientEvent> {
        self.store.move_resize(kind, node, x, y, width, height)
    }

    pub fn delete(&mut self, kind: ObjectKind, node: Uuid) -> Option<ClientEvent> {
        let intent = self.store.delete(kind, node);
        if intent.is_some() {
            self.focus.forget(kind, node);
        }
        intent
    }

    pub fn cast_ballot(&mut self, node: Uuid, option_index: u32) -> Option<ClientEvent> {
        self.store.cast_ballot(node, option_index)
    }

    /// Focus an object and bring it to front.
    pub fn select(&mut self, kind: ObjectKind, node: Uuid) -> Option<ClientEvent> {
        self.focus.focus(&mut self.store, kind, node)
    }

    /// Broadcast the local cursor over the peer data channels.
    pub fn send_cursor(&mut self, x: f64, y: f64) {
        self.mesh.send_cursor(x, y);
    }

    /// Start the media call.
    ///
    /// # Errors
    ///
    /// Call-setup failure (capture denied); object sync is unaffected.
    pub fn start_call(&mut self) -> Result<(), CallError> {
        self.media.start(&mut self.mesh)
    }

    pub fn end_call(&mut self) {
        self.media.end(&mut self.mesh);
    }

    // =========================================================================
    // INBOUND EVENTS
    // =========================================================================

    /// Apply one relay event; returns intents to send back.
    pub fn handle_event(&mut self, event: &ServerEvent, now: Instant) -> Vec<ClientEvent> {
        match event {
            ServerEvent::RoomInfo { participants, projects } => {
                // Peers already in the room observed our user-joined and
                // will call us; we create no links here.
                self.roster =
                    participants.iter().map(|p| (p.user_id, p.clone())).collect();
                self.projects.clone_from(projects);
                vec![]
            }
            ServerEvent::UserJoined { participant } => {
                self.roster.insert(participant.user_id, participant.clone());
                self.mesh.on_user_joined(participant.user_id, now)
            }
            ServerEvent::UserLeft { user_id } => {
                self.roster.remove(user_id);
                self.mesh.on_user_left(*user_id);
                self.cursors.remove(*user_id);
                self.media.on_peer_dropped(*user_id);
                vec![]
            }

            ServerEvent::ProjectInit { project_id, texts, images, votes } => {
                if self.current_project == Some(*project_id) {
                    self.store.load(
                        *project_id,
                        texts.clone(),
                        images.clone(),
                        votes.clone(),
                    );
                } else {
                    debug!(%project_id, "stale project-init dropped");
                }
                vec![]
            }
            ServerEvent::ProjectCreated { project } => {
                if !self.projects.iter().any(|p| p.project_id == project.project_id) {
                    self.projects.push(project.clone());
                }
                vec![]
            }
            ServerEvent::ProjectRenamed { project_id, name } => {
                if let Some(p) = self.projects.iter_mut().find(|p| p.project_id == *project_id) {
                    p.name.clone_from(name);
                }
                vec![]
            }
            ServerEvent::ProjectDeleted { project_id } => {
                self.projects.retain(|p| p.project_id != *project_id);
                if self.current_project == Some(*project_id) {
                    self.current_project = None;
                    self.store.reset();
                    self.focus.blur();
                }
                vec![]
            }

            ServerEvent::WebrtcOffer { to, from, offer } => {
                if *to == self.user_id {
                    self.mesh.on_offer(*from, offer, now)
                } else {
                    vec![]
                }
            }
            ServerEvent::WebrtcAnswer { to, from, answer } => {
                if *to == self.user_id {
                    self.mesh.on_answer(*from, answer);
                }
                vec![]
            }
            ServerEvent::WebrtcCandidate { to, from, candidate } => {
                if *to == self.user_id {
                    self.mesh.on_candidate(*from, candidate);
                }
                vec![]
            }

            ServerEvent::Error { message } => {
                warn!(%message, "relay reported an error");
                vec![]
            }

            // Object broadcasts: only for the project we are on.
            object_event => {
                match object_event.project_scope() {
                    Some(project_id) if self.current_project == Some(project_id) => {
                        self.apply_object_event(object_event);
                    }
                    Some(project_id) => {
                        debug!(%project_id, "broadcast for another project dropped");
                    }
                    None => {}
                }
                vec![]
            }
        }
    }

    /// Process a driver notification and return intents to send.
    pub fn handle_link_event(&mut self, event: &LinkEvent, now: Instant) -> Vec<ClientEvent> {
        match self.mesh.on_link_event(event, now) {
            MeshEffect::Signal(events) => events,
            MeshEffect::Cursor(msg) => {
                self.cursors.update(msg);
                vec![]
            }
            MeshEffect::RemoteTrack { peer, track } => {
                self.media.on_remote_track(peer, track);
                vec![]
            }
            MeshEffect::PeerDropped(peer) => {
                self.cursors.remove(peer);
                self.media.on_peer_dropped(peer);
                vec![]
            }
            MeshEffect::None => vec![],
        }
    }

    /// Periodic maintenance: fail out stuck negotiations.
    pub fn tick(&mut self, now: Instant) {
        for peer in self.mesh.tick(now) {
            self.cursors.remove(peer);
            self.media.on_peer_dropped(peer);
        }
    }

    fn apply_object_event(&mut self, event: &ServerEvent) {
        // Keep focus coherent when someone else deletes the focused object.
        match event {
            ServerEvent::RemoveTextBox { node, .. } => {
                self.focus.forget(ObjectKind::Text, *node);
            }
            ServerEvent::RemoveImage { node, .. } => {
                self.focus.forget(ObjectKind::Image, *node);
            }
            ServerEvent::RemoveVote { node, .. } => {
                self.focus.forget(ObjectKind::Vote, *node);
            }
            _ => {}
        }
        self.store.apply(event);
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
