use super::*;
use events::BoxMove;

fn store_with_project() -> (ObjectStore, Uuid) {
    let mut store = ObjectStore::new(Uuid::new_v4(), Uuid::new_v4());
    let project_id = Uuid::new_v4();
    store.load(project_id, vec![], vec![], vec![]);
    (store, project_id)
}

fn correlation_of(intent: &ClientEvent) -> Uuid {
    match intent {
        ClientEvent::TextEvent(t) => t.correlation.expect("correlation"),
        ClientEvent::VoteEvent(v) => v.correlation.expect("correlation"),
        other => panic!("not a create intent: {other:?}"),
    }
}

/// Build the confirmation the relay would broadcast for a text create.
fn confirm_text(intent: &ClientEvent, project_id: Uuid, content: &str) -> (Node, ServerEvent) {
    let node = Uuid::new_v4();
    let ClientEvent::TextEvent(t) = intent else { panic!("not a text intent") };
    let object = TextObject {
        base: ObjectBox {
            node,
            project_id,
            team_id: Uuid::new_v4(),
            x: t.fields.x.unwrap(),
            y: t.fields.y.unwrap(),
            width: t.fields.width.unwrap(),
            height: t.fields.height.unwrap(),
            z_index: 1,
        },
        content: content.to_owned(),
        color: "#222222".to_owned(),
        font_size: 16.0,
        font_family: "sans-serif".to_owned(),
    };
    (node, ServerEvent::AddTextBox { object, correlation: t.correlation })
}

// =============================================================================
// CREATE + RECONCILIATION
// =============================================================================

#[test]
fn create_without_project_is_refused() {
    let mut store = ObjectStore::new(Uuid::new_v4(), Uuid::new_v4());
    assert!(store.create_text(10.0, 10.0, "x").is_none());
}

#[test]
fn hello_text_box_confirmation_swaps_placeholder() {
    let (mut store, project_id) = store_with_project();

    let intent = store.create_text(100.0, 100.0, "hello").expect("intent");
    let correlation = correlation_of(&intent);
    assert_eq!(store.pending_count(), 1);
    assert!(store.texts.is_empty());

    let (node, confirmation) = confirm_text(&intent, project_id, "hello");
    store.apply(&confirmation);

    assert_eq!(store.pending_count(), 0);
    assert_eq!(store.texts.len(), 1);
    let object = store.texts.get(&node).expect("confirmed object");
    assert_eq!(object.content, "hello");
    assert!((object.base.x - 100.0).abs() < f64::EPSILON);
    assert!((object.base.y - 100.0).abs() < f64::EPSILON);
    assert_ne!(object.base.node, correlation, "node is not the local placeholder");
}

#[test]
fn foreign_add_leaves_own_pending_alone() {
    let (mut store, project_id) = store_with_project();
    let intent = store.create_text(10.0, 10.0, "mine").expect("intent");

    // Another client's creation arrives first, with their correlation.
    let (_, mut foreign) = confirm_text(&intent, project_id, "theirs");
    if let ServerEvent::AddTextBox { correlation, .. } = &mut foreign {
        *correlation = Some(Uuid::new_v4());
    }
    store.apply(&foreign);

    assert_eq!(store.pending_count(), 1, "own placeholder still pending");
    assert_eq!(store.texts.len(), 1);
}

#[test]
fn project_switch_abandons_pending() {
    let (mut store, _) = store_with_project();
    store.create_text(10.0, 10.0, "never confirmed").expect("intent");
    assert_eq!(store.pending_count(), 1);

    store.load(Uuid::new_v4(), vec![], vec![], vec![]);
    assert_eq!(store.pending_count(), 0);
    assert!(store.texts.is_empty());
}

// =============================================================================
// MUTATION PRECONDITIONS
// =============================================================================

#[test]
fn mutating_unconfirmed_node_is_silent() {
    let (mut store, _) = store_with_project();
    let intent = store.create_text(10.0, 10.0, "pending").expect("intent");
    let placeholder = correlation_of(&intent);

    // The placeholder node is not yet addressable.
    assert!(store
        .update_text(placeholder, TextFields { content: Some("x".into()), ..TextFields::default() })
        .is_none());
    assert!(store.move_resize(ObjectKind::Text, placeholder, 0.0, 0.0, 200.0, 100.0).is_none());
    assert!(store.delete(ObjectKind::Text, placeholder).is_none());
    assert_eq!(store.pending_count(), 1);
}

#[test]
fn create_update_delete_leaves_no_trace() {
    let (mut store, project_id) = store_with_project();
    let intent = store.create_text(10.0, 10.0, "doomed").expect("intent");
    let (node, confirmation) = confirm_text(&intent, project_id, "doomed");
    store.apply(&confirmation);

    store
        .update_text(node, TextFields { content: Some("edited".into()), ..TextFields::default() })
        .expect("update intent");
    store
        .update_text(node, TextFields { color: Some("#ff0000".into()), ..TextFields::default() })
        .expect("update intent");
    store.delete(ObjectKind::Text, node).expect("delete intent");

    assert!(!store.texts.contains_key(&node));
    assert_eq!(store.texts.len(), 0);
}

// =============================================================================
// CLAMPING
// =============================================================================

#[test]
fn create_clamps_position_to_viewport() {
    let (mut store, _) = store_with_project();
    store.set_viewport(800.0, 600.0);

    let intent = store.create_text(10_000.0, -50.0, "clamped").expect("intent");
    let ClientEvent::TextEvent(t) = &intent else { panic!() };
    let x = t.fields.x.unwrap();
    let y = t.fields.y.unwrap();
    assert!((x - (800.0 - consts::DEFAULT_TEXT_WIDTH)).abs() < f64::EPSILON);
    assert!((y - 0.0).abs() < f64::EPSILON);
}

#[test]
fn resize_floors_at_kind_minimum() {
    let (mut store, project_id) = store_with_project();
    let intent = store.create_text(10.0, 10.0, "tiny").expect("intent");
    let (node, confirmation) = confirm_text(&intent, project_id, "tiny");
    store.apply(&confirmation);

    let out = store.move_resize(ObjectKind::Text, node, 10.0, 10.0, 1.0, 1.0).expect("intent");
    let ClientEvent::TextEvent(t) = &out else { panic!() };
    assert!((t.fields.width.unwrap() - consts::MIN_TEXT_WIDTH).abs() < f64::EPSILON);
    assert!((t.fields.height.unwrap() - consts::MIN_TEXT_HEIGHT).abs() < f64::EPSILON);
    let stored = store.texts.get(&node).unwrap();
    assert!((stored.base.width - consts::MIN_TEXT_WIDTH).abs() < f64::EPSILON);
}

// =============================================================================
// BROADCAST APPLICATION
// =============================================================================

#[test]
fn repeated_move_broadcast_is_idempotent() {
    let (mut store, project_id) = store_with_project();
    let intent = store.create_text(10.0, 10.0, "m").expect("intent");
    let (node, confirmation) = confirm_text(&intent, project_id, "m");
    store.apply(&confirmation);

    let mv = ServerEvent::MoveTextBox(BoxMove {
        node,
        project_id,
        x: 55.0,
        y: 66.0,
        width: 240.0,
        height: 120.0,
    });
    store.apply(&mv);
    let first = store.texts.get(&node).unwrap().clone();
    store.apply(&mv);
    let second = store.texts.get(&node).unwrap().clone();
    assert_eq!(first, second);
}

#[test]
fn move_broadcast_for_unknown_node_is_ignored() {
    let (mut store, project_id) = store_with_project();
    store.apply(&ServerEvent::MoveTextBox(BoxMove {
        node: Uuid::new_v4(),
        project_id,
        x: 1.0,
        y: 2.0,
        width: 240.0,
        height: 120.0,
    }));
    assert!(store.texts.is_empty());
}

#[test]
fn choice_vote_broadcast_replaces_tally_and_ballot() {
    let (mut store, project_id) = store_with_project();
    let node = Uuid::new_v4();
    let base = ObjectBox {
        node,
        project_id,
        team_id: Uuid::new_v4(),
        x: 0.0,
        y: 0.0,
        width: 260.0,
        height: 180.0,
        z_index: 1,
    };
    store.apply(&ServerEvent::AddVote {
        object: VoteObject {
            base,
            title: "lunch".into(),
            options: vec![VoteOption { content: "A".into() }, VoteOption { content: "B".into() }],
            tally: vec![0, 0],
            ballots: vec![],
        },
        correlation: None,
    });

    let voter = Uuid::new_v4();
    let choice = |tally: Vec<u32>, option_index| ServerEvent::ChoiceVote {
        node,
        project_id,
        tally,
        voter_id: voter,
        option_index,
    };

    store.apply(&choice(vec![1, 0], 1));
    let vote = store.votes.get(&node).unwrap();
    assert_eq!(vote.tally, vec![1, 0]);
    assert_eq!(vote.ballots.len(), 1);

    // Changed vote: ballot replaced, not duplicated.
    store.apply(&choice(vec![0, 1], 2));
    let vote = store.votes.get(&node).unwrap();
    assert_eq!(vote.tally, vec![0, 1]);
    assert_eq!(vote.ballots.len(), 1);
    assert_eq!(vote.ballots[0].option_index, 2);

    // Retraction removes the ballot.
    store.apply(&choice(vec![0, 0], 0));
    let vote = store.votes.get(&node).unwrap();
    assert_eq!(vote.tally, vec![0, 0]);
    assert!(vote.ballots.is_empty());

    let cast = vote.ballots.iter().filter(|b| b.option_index != 0).count();
    assert_eq!(vote.tally.iter().sum::<u32>() as usize, cast);
}

// =============================================================================
// Z ARENA
// =============================================================================

#[test]
fn max_z_spans_confirmed_and_pending() {
    let (mut store, project_id) = store_with_project();
    let intent = store.create_text(0.0, 0.0, "a").expect("intent");
    assert_eq!(store.max_z(), 1, "pending object holds z 1");

    let (node, confirmation) = confirm_text(&intent, project_id, "a");
    store.apply(&confirmation);
    store.create_vote(0.0, 0.0, "poll", vec![
        VoteOption { content: "A".into() },
        VoteOption { content: "B".into() },
    ]);
    assert_eq!(store.max_z(), 2);

    store.set_z_index(ObjectKind::Text, node, 7).expect("intent");
    assert_eq!(store.max_z(), 7);
}
