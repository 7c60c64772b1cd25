use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn create_project_appears_in_summaries() {
    let state = AppState::new();
    let team_id = Uuid::new_v4();
    let (_c, _rx) = test_helpers::seed_client(&state, team_id, Uuid::new_v4(), None).await;

    let created = create_project(&state, team_id, "Roadmap").await.unwrap();
    assert_eq!(created.name, "Roadmap");

    let rooms = state.rooms.read().await;
    let room = rooms.get(&team_id).unwrap();
    assert!(room.projects.contains_key(&created.project_id));
}

#[tokio::test]
async fn create_project_requires_live_room() {
    let state = AppState::new();
    let result = create_project(&state, Uuid::new_v4(), "Orphan").await;
    assert!(matches!(result.unwrap_err(), ProjectError::RoomNotFound(_)));
}

#[tokio::test]
async fn rename_project_updates_name() {
    let state = AppState::new();
    let team_id = Uuid::new_v4();
    let (_c, _rx) = test_helpers::seed_client(&state, team_id, Uuid::new_v4(), None).await;
    let project_id = test_helpers::seed_project(&state, team_id, "Old").await;

    rename_project(&state, team_id, project_id, "New").await.unwrap();

    let rooms = state.rooms.read().await;
    assert_eq!(rooms.get(&team_id).unwrap().projects.get(&project_id).unwrap().name, "New");
}

#[tokio::test]
async fn rename_unknown_project_fails() {
    let state = AppState::new();
    let team_id = Uuid::new_v4();
    let (_c, _rx) = test_helpers::seed_client(&state, team_id, Uuid::new_v4(), None).await;

    let result = rename_project(&state, team_id, Uuid::new_v4(), "x").await;
    assert!(matches!(result.unwrap_err(), ProjectError::NotFound(_)));
}

#[tokio::test]
async fn delete_project_detaches_viewing_clients() {
    let state = AppState::new();
    let team_id = Uuid::new_v4();
    let project_id = {
        let (_c, _rx) = test_helpers::seed_client(&state, team_id, Uuid::new_v4(), None).await;
        test_helpers::seed_project(&state, team_id, "Doomed").await
    };
    let (client_id, _rx2) =
        test_helpers::seed_client(&state, team_id, Uuid::new_v4(), Some(project_id)).await;

    delete_project(&state, team_id, project_id).await.unwrap();

    let rooms = state.rooms.read().await;
    let room = rooms.get(&team_id).unwrap();
    assert!(!room.projects.contains_key(&project_id));
    assert_eq!(room.clients.get(&client_id).unwrap().project, None);
}

#[tokio::test]
async fn snapshot_returns_all_object_kinds() {
    let state = AppState::new();
    let team_id = Uuid::new_v4();
    let (_c, _rx) = test_helpers::seed_client(&state, team_id, Uuid::new_v4(), None).await;
    let project_id = test_helpers::seed_project(&state, team_id, "P").await;

    {
        let mut rooms = state.rooms.write().await;
        let project = rooms.get_mut(&team_id).unwrap().projects.get_mut(&project_id).unwrap();
        let base = test_helpers::dummy_box(project_id, team_id);
        project.texts.insert(
            base.node,
            TextObject {
                base,
                content: "hi".into(),
                color: "#000".into(),
                font_size: 14.0,
                font_family: "serif".into(),
            },
        );
    }

    let snap = snapshot(&state, team_id, project_id).await.unwrap();
    assert_eq!(snap.texts.len(), 1);
    assert!(snap.images.is_empty());
    assert!(snap.votes.is_empty());

    let event = init_event(project_id, snap);
    let ServerEvent::ProjectInit { project_id: pid, texts, .. } = event else {
        panic!("expected project-init");
    };
    assert_eq!(pid, project_id);
    assert_eq!(texts[0].content, "hi");
}

#[tokio::test]
async fn snapshot_unknown_project_fails() {
    let state = AppState::new();
    let team_id = Uuid::new_v4();
    let (_c, _rx) = test_helpers::seed_client(&state, team_id, Uuid::new_v4(), None).await;

    let result = snapshot(&state, team_id, Uuid::new_v4()).await;
    assert!(matches!(result.unwrap_err(), ProjectError::NotFound(_)));
}
