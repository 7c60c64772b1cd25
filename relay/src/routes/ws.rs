//! WebSocket handler — bidirectional event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection id and enters a `select!` loop:
//! - Incoming client events → decode + dispatch by event type
//! - Broadcast events from room peers → forward to client
//!
//! Handler logic is pure: it validates, mutates state, and returns an
//! `Outcome`. The dispatch layer owns all outbound concerns — reply to
//! sender, room fan-out, project-scoped fan-out, and user-targeted
//! signaling delivery.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → wait for `join-room` (anything else is rejected)
//! 2. `join-room` → reply `room-info`, broadcast `user-joined` to peers
//! 3. Intents → dispatch → Outcome → fan-out
//! 4. Close → broadcast `user-left` → cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use events::{ClientEvent, Fnc, ImageEvent, ServerEvent, TextEvent, VoteEvent, decode_client_event,
    encode_server_event};

use crate::services;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler logic. The dispatch layer uses this to decide
/// who receives what — handlers never send events directly.
enum Outcome {
    /// Send to sender only.
    Reply(ServerEvent),
    /// Broadcast to every room member, sender included.
    Room(ServerEvent),
    /// Broadcast to room members currently on the project, sender included.
    Project { project_id: Uuid, event: ServerEvent },
    /// Forward to every connection of one user (signaling).
    Targeted { to: Uuid, event: ServerEvent },
    /// Expected no-op: unknown node, late mutation, out-of-scope intent.
    Silent,
}

/// Room membership of one connection, established by `join-room`.
#[derive(Clone, Copy)]
struct Membership {
    team_id: Uuid,
    user_id: Uuid,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for events fanned out by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);

    info!(%client_id, "ws: client connected");
    let mut membership: Option<Membership> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_inbound(&state, &mut membership, client_id, &client_tx, &text)
                                .await;
                        for event in replies {
                            if send_event(&mut socket, &event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Broadcast user-left BEFORE cleanup so peers can tear down their mesh
    // entries proactively instead of waiting for the connection layer.
    if let Some(m) = membership {
        if let Some(user_id) = services::room::leave_room(&state, m.team_id, client_id).await {
            let event = ServerEvent::UserLeft { user_id };
            services::room::broadcast_room(&state, m.team_id, &event, None).await;
        }
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and process one inbound text frame; return events for the sender.
async fn process_inbound(
    state: &AppState,
    membership: &mut Option<Membership>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event = match decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::Error { message: format!("invalid event: {e}") }];
        }
    };

    // join-room establishes membership; everything else requires it.
    if let ClientEvent::JoinRoom { team_id, user_id } = event {
        return join_room(state, membership, client_id, client_tx, team_id, user_id).await;
    }
    let Some(m) = *membership else {
        return vec![ServerEvent::Error { message: "join-room required".into() }];
    };

    let outcome = handle_event(state, m, client_id, &event).await;
    apply_outcome(state, m, outcome).await
}

async fn join_room(
    state: &AppState,
    membership: &mut Option<Membership>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    team_id: Uuid,
    user_id: Uuid,
) -> Vec<ServerEvent> {
    // Re-joining (e.g. switching teams) parts the old room first.
    if let Some(old) = membership.take() {
        if let Some(left) = services::room::leave_room(state, old.team_id, client_id).await {
            let event = ServerEvent::UserLeft { user_id: left };
            services::room::broadcast_room(state, old.team_id, &event, None).await;
        }
    }

    let (participants, projects) =
        services::room::join_room(state, team_id, user_id, client_id, client_tx.clone()).await;
    *membership = Some(Membership { team_id, user_id });

    let announce =
        ServerEvent::UserJoined { participant: events::Participant::new(user_id) };
    services::room::broadcast_room(state, team_id, &announce, Some(client_id)).await;

    vec![ServerEvent::RoomInfo { participants, projects }]
}

async fn apply_outcome(state: &AppState, m: Membership, outcome: Outcome) -> Vec<ServerEvent> {
    match outcome {
        Outcome::Reply(event) => vec![event],
        Outcome::Room(event) => {
            services::room::broadcast_room(state, m.team_id, &event, None).await;
            vec![]
        }
        Outcome::Project { project_id, event } => {
            services::room::broadcast_project(state, m.team_id, project_id, &event, None).await;
            vec![]
        }
        Outcome::Targeted { to, event } => {
            services::room::send_to_user(state, m.team_id, to, &event).await;
            vec![]
        }
        Outcome::Silent => vec![],
    }
}

async fn handle_event(
    state: &AppState,
    m: Membership,
    client_id: Uuid,
    event: &ClientEvent,
) -> Outcome {
    match event {
        // Handled before dispatch; unreachable here but harmless.
        ClientEvent::JoinRoom { .. } => Outcome::Silent,

        ClientEvent::JoinProject { project_id } => {
            match services::project::snapshot(state, m.team_id, *project_id).await {
                Ok(snapshot) => {
                    services::room::set_project(state, m.team_id, client_id, Some(*project_id))
                        .await;
                    Outcome::Reply(services::project::init_event(*project_id, snapshot))
                }
                Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
            }
        }

        ClientEvent::CreateProject { name } => {
            match services::project::create_project(state, m.team_id, name).await {
                Ok(project) => Outcome::Room(ServerEvent::ProjectCreated { project }),
                Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
            }
        }
        ClientEvent::RenameProject { project_id, name } => {
            match services::project::rename_project(state, m.team_id, *project_id, name).await {
                Ok(()) => Outcome::Room(ServerEvent::ProjectRenamed {
                    project_id: *project_id,
                    name: name.clone(),
                }),
                Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
            }
        }
        ClientEvent::DeleteProject { project_id } => {
            match services::project::delete_project(state, m.team_id, *project_id).await {
                Ok(()) => Outcome::Room(ServerEvent::ProjectDeleted { project_id: *project_id }),
                Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
            }
        }

        ClientEvent::TextEvent(intent) => handle_text(state, m, intent).await,
        ClientEvent::ImageEvent(intent) => handle_image(state, m, intent).await,
        ClientEvent::VoteEvent(intent) => handle_vote(state, m, intent).await,

        // Signaling is relayed verbatim; only `from` is stamped with the
        // authenticated sender so peers cannot be impersonated.
        ClientEvent::WebrtcOffer { to, offer, .. } => Outcome::Targeted {
            to: *to,
            event: ServerEvent::WebrtcOffer { to: *to, from: m.user_id, offer: offer.clone() },
        },
        ClientEvent::WebrtcAnswer { to, answer, .. } => Outcome::Targeted {
            to: *to,
            event: ServerEvent::WebrtcAnswer { to: *to, from: m.user_id, answer: answer.clone() },
        },
        ClientEvent::WebrtcCandidate { to, candidate, .. } => Outcome::Targeted {
            to: *to,
            event: ServerEvent::WebrtcCandidate {
                to: *to,
                from: m.user_id,
                candidate: candidate.clone(),
            },
        },
    }
}

// =============================================================================
// OBJECT HANDLERS
// =============================================================================

async fn handle_text(state: &AppState, m: Membership, intent: &TextEvent) -> Outcome {
    let project_id = intent.project_id;
    match intent.fnc {
        Fnc::New => match services::object::create_text(state, m.team_id, intent).await {
            Ok(object) => Outcome::Project {
                project_id,
                event: ServerEvent::AddTextBox { object, correlation: intent.correlation },
            },
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Update => match services::object::update_text(state, m.team_id, intent).await {
            Ok(Some(object)) => {
                Outcome::Project { project_id, event: ServerEvent::UpdateTextBox { object } }
            }
            Ok(None) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Move => match services::object::move_text(state, m.team_id, intent).await {
            Ok(Some(mv)) => {
                Outcome::Project { project_id, event: ServerEvent::MoveTextBox(mv) }
            }
            Ok(None) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Delete => match services::object::delete_text(state, m.team_id, intent).await {
            Ok(true) => Outcome::Project {
                project_id,
                event: ServerEvent::RemoveTextBox {
                    node: intent.node.unwrap_or_default(),
                    project_id,
                },
            },
            Ok(false) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Choice => {
            warn!("textEvent with fnc=choice ignored");
            Outcome::Silent
        }
    }
}

async fn handle_image(state: &AppState, m: Membership, intent: &ImageEvent) -> Outcome {
    let project_id = intent.project_id;
    match intent.fnc {
        // Image creation travels through the asset upload side-channel.
        Fnc::New | Fnc::Choice => {
            warn!(fnc = ?intent.fnc, "imageEvent fnc not supported on this channel");
            Outcome::Silent
        }
        Fnc::Update => match services::object::update_image(state, m.team_id, intent).await {
            Ok(Some(object)) => {
                Outcome::Project { project_id, event: ServerEvent::UpdateImage { object } }
            }
            Ok(None) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Move => match services::object::move_image(state, m.team_id, intent).await {
            Ok(Some(mv)) => Outcome::Project { project_id, event: ServerEvent::MoveImage(mv) },
            Ok(None) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Delete => match services::object::delete_image(state, m.team_id, intent).await {
            Ok(true) => Outcome::Project {
                project_id,
                event: ServerEvent::RemoveImage {
                    node: intent.node.unwrap_or_default(),
                    project_id,
                },
            },
            Ok(false) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
    }
}

async fn handle_vote(state: &AppState, m: Membership, intent: &VoteEvent) -> Outcome {
    let project_id = intent.project_id;
    match intent.fnc {
        Fnc::New => match services::object::create_vote(state, m.team_id, intent).await {
            Ok(object) => Outcome::Project {
                project_id,
                event: ServerEvent::AddVote { object, correlation: intent.correlation },
            },
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Update => match services::object::update_vote(state, m.team_id, intent).await {
            Ok(Some(object)) => {
                Outcome::Project { project_id, event: ServerEvent::UpdateVote { object } }
            }
            Ok(None) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Move => match services::object::move_vote(state, m.team_id, intent).await {
            Ok(Some(mv)) => Outcome::Project { project_id, event: ServerEvent::MoveVote(mv) },
            Ok(None) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Delete => match services::object::delete_vote(state, m.team_id, intent).await {
            Ok(true) => Outcome::Project {
                project_id,
                event: ServerEvent::RemoveVote {
                    node: intent.node.unwrap_or_default(),
                    project_id,
                },
            },
            Ok(false) => Outcome::Silent,
            Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
        },
        Fnc::Choice => {
            match services::object::choice_vote(state, m.team_id, m.user_id, intent).await {
                Ok(Some(outcome)) => Outcome::Project {
                    project_id,
                    event: ServerEvent::ChoiceVote {
                        node: outcome.node,
                        project_id,
                        tally: outcome.tally,
                        voter_id: outcome.voter_id,
                        option_index: outcome.option_index,
                    },
                },
                Ok(None) => Outcome::Silent,
                Err(e) => Outcome::Reply(ServerEvent::Error { message: e.to_string() }),
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = encode_server_event(event);
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
