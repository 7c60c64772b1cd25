use super::test_driver::{Call, Log, MockDriver};
use super::*;
use std::cell::RefCell;
use std::rc::Rc;

fn mesh() -> (PeerMesh<MockDriver>, Rc<RefCell<Log>>, Uuid) {
    let self_id = Uuid::new_v4();
    let (driver, log) = MockDriver::new();
    (PeerMesh::new(self_id, driver), log, self_id)
}

/// Drive a caller link with `peer` all the way to `Connected`.
fn connect_as_caller(mesh: &mut PeerMesh<MockDriver>, peer: Uuid, now: Instant) {
    let offers = mesh.on_user_joined(peer, now);
    assert_eq!(offers.len(), 1);
    mesh.on_answer(peer, &serde_json::json!({"type": "answer"}));
    mesh.on_link_event(&LinkEvent::StateChanged { peer, state: LinkState::Connected }, now);
    mesh.on_link_event(&LinkEvent::ChannelOpen { peer }, now);
}

// =============================================================================
// CALLER / CALLEE CONVENTION
// =============================================================================

#[test]
fn user_joined_makes_us_the_caller() {
    let (mut mesh, log, self_id) = mesh();
    let peer = Uuid::new_v4();

    let out = mesh.on_user_joined(peer, Instant::now());
    let [ClientEvent::WebrtcOffer { to, from, .. }] = out.as_slice() else {
        panic!("expected a single offer, got {out:?}");
    };
    assert_eq!(*to, peer);
    assert_eq!(*from, self_id);
    assert_eq!(mesh.link_state(peer), Some(LinkState::Negotiating));

    let log = log.borrow();
    assert_eq!(log.calls[0], Call::Open { peer, initiator: true });
    assert_eq!(log.calls[1], Call::Offer(peer));
}

#[test]
fn offer_makes_us_the_callee() {
    let (mut mesh, log, self_id) = mesh();
    let peer = Uuid::new_v4();

    let out = mesh.on_offer(peer, &serde_json::json!({"type": "offer"}), Instant::now());
    let [ClientEvent::WebrtcAnswer { to, from, .. }] = out.as_slice() else {
        panic!("expected a single answer, got {out:?}");
    };
    assert_eq!(*to, peer);
    assert_eq!(*from, self_id);
    assert_eq!(mesh.link_state(peer), Some(LinkState::Negotiating));
    assert_eq!(log.borrow().calls[0], Call::Open { peer, initiator: false });
}

#[test]
fn simultaneous_observation_yields_one_link_per_side() {
    // A was in the room; B joins. A observes user-joined and calls; B saw A
    // in its roster snapshot and waits. Exactly one link each, no dupes.
    let (mut a, _, _) = mesh();
    let (mut b, _, _) = mesh();
    let (id_a, id_b) = (Uuid::new_v4(), Uuid::new_v4());
    let now = Instant::now();

    let offers = a.on_user_joined(id_b, now);
    let [ClientEvent::WebrtcOffer { offer, .. }] = offers.as_slice() else { panic!() };

    let answers = b.on_offer(id_a, offer, now);
    let [ClientEvent::WebrtcAnswer { answer, .. }] = answers.as_slice() else { panic!() };
    a.on_answer(id_b, answer);

    a.on_link_event(&LinkEvent::StateChanged { peer: id_b, state: LinkState::Connected }, now);
    b.on_link_event(&LinkEvent::StateChanged { peer: id_a, state: LinkState::Connected }, now);

    assert_eq!(a.connected_peers(), vec![id_b]);
    assert_eq!(b.connected_peers(), vec![id_a]);
}

#[test]
fn repeated_user_joined_does_not_duplicate_link() {
    let (mut mesh, log, _) = mesh();
    let peer = Uuid::new_v4();
    let now = Instant::now();

    assert_eq!(mesh.on_user_joined(peer, now).len(), 1);
    assert!(mesh.on_user_joined(peer, now).is_empty());
    let opens = log
        .borrow()
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Open { .. }))
        .count();
    assert_eq!(opens, 1);
}

#[test]
fn answer_for_unknown_peer_is_dropped() {
    let (mut mesh, log, _) = mesh();
    mesh.on_answer(Uuid::new_v4(), &serde_json::json!({"type": "answer"}));
    assert!(log.borrow().calls.is_empty());
}

// =============================================================================
// RENEGOTIATION
// =============================================================================

#[test]
fn initiator_renegotiates_from_connected_only() {
    let (mut mesh, _, _) = mesh();
    let peer = Uuid::new_v4();
    let now = Instant::now();
    connect_as_caller(&mut mesh, peer, now);

    let effect = mesh.on_link_event(&LinkEvent::NegotiationNeeded { peer }, now);
    let MeshEffect::Signal(events) = effect else {
        panic!("expected renegotiation offer, got {effect:?}");
    };
    assert!(matches!(events.as_slice(), [ClientEvent::WebrtcOffer { .. }]));
    assert_eq!(mesh.link_state(peer), Some(LinkState::Negotiating));

    // Already negotiating: a second signal is suppressed.
    let effect = mesh.on_link_event(&LinkEvent::NegotiationNeeded { peer }, now);
    assert!(matches!(effect, MeshEffect::None));
}

#[test]
fn callee_never_initiates_renegotiation() {
    let (mut mesh, _, _) = mesh();
    let peer = Uuid::new_v4();
    let now = Instant::now();
    mesh.on_offer(peer, &serde_json::json!({"type": "offer"}), now);
    mesh.on_link_event(&LinkEvent::StateChanged { peer, state: LinkState::Connected }, now);

    let effect = mesh.on_link_event(&LinkEvent::NegotiationNeeded { peer }, now);
    assert!(matches!(effect, MeshEffect::None));
    assert_eq!(mesh.link_state(peer), Some(LinkState::Connected));
}

#[test]
fn callee_answers_renegotiation_offer_on_live_link() {
    let (mut mesh, _, _) = mesh();
    let peer = Uuid::new_v4();
    let now = Instant::now();
    mesh.on_offer(peer, &serde_json::json!({"type": "offer"}), now);
    mesh.on_link_event(&LinkEvent::StateChanged { peer, state: LinkState::Connected }, now);

    let out = mesh.on_offer(peer, &serde_json::json!({"type": "offer"}), now);
    assert!(matches!(out.as_slice(), [ClientEvent::WebrtcAnswer { .. }]));
    assert_eq!(mesh.link_state(peer), Some(LinkState::Negotiating));
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[test]
fn failed_state_tears_down_completely() {
    let (mut mesh, log, _) = mesh();
    let peer = Uuid::new_v4();
    let now = Instant::now();
    connect_as_caller(&mut mesh, peer, now);

    let effect =
        mesh.on_link_event(&LinkEvent::StateChanged { peer, state: LinkState::Failed }, now);
    assert!(matches!(effect, MeshEffect::PeerDropped(p) if p == peer));
    assert_eq!(mesh.link_state(peer), None);
    assert!(log.borrow().calls.contains(&Call::Close(peer)));

    // A trailing candidate after teardown is silently dropped.
    let before = log.borrow().calls.len();
    mesh.on_candidate(peer, &serde_json::json!({"candidate": ""}));
    assert_eq!(log.borrow().calls.len(), before);
}

#[test]
fn user_left_closes_link_proactively() {
    let (mut mesh, log, _) = mesh();
    let peer = Uuid::new_v4();
    connect_as_caller(&mut mesh, peer, Instant::now());

    mesh.on_user_left(peer);
    assert_eq!(mesh.link_state(peer), None);
    assert!(log.borrow().calls.contains(&Call::Close(peer)));
}

#[test]
fn stuck_negotiation_times_out_on_tick() {
    let (mut mesh, _, _) = mesh();
    let stuck = Uuid::new_v4();
    let healthy = Uuid::new_v4();
    let start = Instant::now();

    mesh.on_user_joined(stuck, start);
    connect_as_caller(&mut mesh, healthy, start);

    let dropped = mesh.tick(start + consts::NEGOTIATION_TIMEOUT);
    assert_eq!(dropped, vec![stuck]);
    assert_eq!(mesh.link_state(stuck), None);
    assert_eq!(mesh.link_state(healthy), Some(LinkState::Connected));
}

// =============================================================================
// DATA CHANNEL
// =============================================================================

#[test]
fn cursor_broadcast_reaches_open_channels_only() {
    let (mut mesh, log, self_id) = mesh();
    let open = Uuid::new_v4();
    let negotiating = Uuid::new_v4();
    let now = Instant::now();
    connect_as_caller(&mut mesh, open, now);
    mesh.on_user_joined(negotiating, now);

    mesh.send_cursor(12.0, 34.0);

    let log = log.borrow();
    assert_eq!(log.sent.len(), 1);
    let (peer, payload) = &log.sent[0];
    assert_eq!(*peer, open);
    let msg: CursorMsg = serde_json::from_slice(payload).expect("cursor json");
    assert_eq!(msg.user_id, self_id);
    assert!((msg.x - 12.0).abs() < f64::EPSILON);
}

#[test]
fn inbound_data_decodes_to_cursor_effect() {
    let (mut mesh, _, _) = mesh();
    let peer = Uuid::new_v4();
    let now = Instant::now();
    connect_as_caller(&mut mesh, peer, now);

    let msg = CursorMsg { user_id: peer, x: 5.0, y: 6.0 };
    let payload = serde_json::to_vec(&msg).unwrap();
    let effect = mesh.on_link_event(&LinkEvent::Data { peer, payload }, now);
    let MeshEffect::Cursor(got) = effect else { panic!("expected cursor, got {effect:?}") };
    assert_eq!(got, msg);

    // Garbage on the channel is dropped, not fatal.
    let effect = mesh.on_link_event(&LinkEvent::Data { peer, payload: b"garbage".to_vec() }, now);
    assert!(matches!(effect, MeshEffect::None));
}
