use super::*;
use crate::mesh::test_driver::MockDriver;
use events::{Fnc, ObjectBox, ServerEvent, TextEvent, TextObject};
use std::time::Instant;
use uuid::Uuid;

fn session_on_project() -> (Session<MockDriver>, Uuid) {
    let (driver, _) = MockDriver::new();
    let mut session = Session::new(Uuid::new_v4(), Uuid::new_v4(), driver);
    let project_id = Uuid::new_v4();
    session.join_project(project_id);
    session.handle_event(
        &ServerEvent::ProjectInit { project_id, texts: vec![], images: vec![], votes: vec![] },
        Instant::now(),
    );
    (session, project_id)
}

fn add_text(
    session: &mut Session<MockDriver>,
    project_id: Uuid,
    x: f64,
    y: f64,
    z_index: i64,
) -> Uuid {
    let node = Uuid::new_v4();
    session.handle_event(
        &ServerEvent::AddTextBox {
            object: TextObject {
                base: ObjectBox {
                    node,
                    project_id,
                    team_id: Uuid::new_v4(),
                    x,
                    y,
                    width: 240.0,
                    height: 120.0,
                    z_index,
                },
                content: "t".into(),
                color: "#222222".into(),
                font_size: 16.0,
                font_family: "sans-serif".into(),
            },
            correlation: None,
        },
        Instant::now(),
    );
    node
}

#[test]
fn text_tool_creates_at_point_then_reverts_to_select() {
    let (mut session, _) = session_on_project();
    let mut surface = PointerSurface::new();
    surface.set_tool(Tool::Text);

    let out = surface.pointer_down(&mut session, 300.0, 200.0);
    let [ClientEvent::TextEvent(TextEvent { fnc: Fnc::New, fields, .. })] = out.as_slice() else {
        panic!("expected create intent, got {out:?}");
    };
    assert!((fields.x.unwrap() - 300.0).abs() < f64::EPSILON);
    assert_eq!(surface.tool(), Tool::Select);
    assert_eq!(session.store.pending_count(), 1);
}

#[test]
fn select_hits_topmost_by_z_and_raises_it() {
    let (mut session, project_id) = session_on_project();
    let below = add_text(&mut session, project_id, 50.0, 50.0, 1);
    let above = add_text(&mut session, project_id, 50.0, 50.0, 2);
    let mut surface = PointerSurface::new();

    // Both boxes cover (60, 60); the higher z wins.
    let out = surface.pointer_down(&mut session, 60.0, 60.0);
    let [ClientEvent::TextEvent(intent)] = out.as_slice() else { panic!() };
    assert_eq!(intent.node, Some(above));
    assert_eq!(intent.fields.z_index, Some(3), "raised above the previous maximum");
    assert_eq!(session.focus.focused(), Some((ObjectKind::Text, above)));
    assert!(session.store.texts.get(&below).unwrap().base.z_index < 3);
}

#[test]
fn empty_click_blurs_focus() {
    let (mut session, project_id) = session_on_project();
    let node = add_text(&mut session, project_id, 50.0, 50.0, 1);
    let mut surface = PointerSurface::new();
    surface.pointer_down(&mut session, 60.0, 60.0);
    assert_eq!(session.focus.focused(), Some((ObjectKind::Text, node)));

    let out = surface.pointer_down(&mut session, 900.0, 900.0);
    assert!(out.is_empty());
    assert_eq!(session.focus.focused(), None);
}

#[test]
fn drag_moves_with_grab_offset() {
    let (mut session, project_id) = session_on_project();
    let node = add_text(&mut session, project_id, 100.0, 100.0, 1);
    let mut surface = PointerSurface::new();

    // Grab at (110, 110): offset (10, 10) inside the box.
    surface.pointer_down(&mut session, 110.0, 110.0);
    assert_eq!(surface.drag_action(), Some(DragAction::Move));

    let out = surface.pointer_move(&mut session, 210.0, 160.0);
    let [ClientEvent::TextEvent(intent)] = out.as_slice() else { panic!() };
    assert_eq!(intent.fnc, Fnc::Move);
    assert!((intent.fields.x.unwrap() - 200.0).abs() < f64::EPSILON);
    assert!((intent.fields.y.unwrap() - 150.0).abs() < f64::EPSILON);

    surface.pointer_up();
    assert!(surface.pointer_move(&mut session, 300.0, 300.0).is_empty());
    let stored = session.store.texts.get(&node).unwrap();
    assert!((stored.base.x - 200.0).abs() < f64::EPSILON);
}

#[test]
fn corner_grab_resizes_with_minimum_floor() {
    let (mut session, project_id) = session_on_project();
    let node = add_text(&mut session, project_id, 100.0, 100.0, 1);
    let mut surface = PointerSurface::new();

    // Bottom-right corner of a 240x120 box at (100, 100) is (340, 220).
    surface.pointer_down(&mut session, 338.0, 218.0);
    assert_eq!(surface.drag_action(), Some(DragAction::Resize));

    let out = surface.pointer_move(&mut session, 101.0, 101.0);
    let [ClientEvent::TextEvent(intent)] = out.as_slice() else { panic!() };
    assert!((intent.fields.width.unwrap() - crate::consts::MIN_TEXT_WIDTH).abs() < f64::EPSILON);
    assert!((intent.fields.height.unwrap() - crate::consts::MIN_TEXT_HEIGHT).abs() < f64::EPSILON);
    let stored = session.store.texts.get(&node).unwrap();
    assert!((stored.base.width - crate::consts::MIN_TEXT_WIDTH).abs() < f64::EPSILON);
}

#[test]
fn drag_survives_object_deletion_gracefully() {
    let (mut session, project_id) = session_on_project();
    let node = add_text(&mut session, project_id, 100.0, 100.0, 1);
    let mut surface = PointerSurface::new();
    surface.pointer_down(&mut session, 110.0, 110.0);

    // Another client deletes the object mid-drag.
    session.handle_event(&ServerEvent::RemoveTextBox { node, project_id }, Instant::now());

    assert!(surface.pointer_move(&mut session, 300.0, 300.0).is_empty());
    assert_eq!(surface.drag_action(), None);
}
