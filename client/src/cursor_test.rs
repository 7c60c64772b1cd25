use super::*;

#[test]
fn latest_message_per_peer_wins() {
    let mut cursors = CursorMap::new();
    let peer = Uuid::new_v4();

    cursors.update(CursorMsg { user_id: peer, x: 10.0, y: 10.0 });
    cursors.update(CursorMsg { user_id: peer, x: 99.0, y: 42.0 });

    let msg = cursors.get(peer).expect("cursor present");
    assert!((msg.x - 99.0).abs() < f64::EPSILON);
    assert!((msg.y - 42.0).abs() < f64::EPSILON);
    assert_eq!(cursors.iter().count(), 1);
}

#[test]
fn remove_forgets_peer() {
    let mut cursors = CursorMap::new();
    let peer = Uuid::new_v4();
    cursors.update(CursorMsg { user_id: peer, x: 1.0, y: 2.0 });

    cursors.remove(peer);
    assert!(cursors.get(peer).is_none());
}
