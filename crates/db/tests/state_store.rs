use af_core::{Builder, BuilderStatus, BuilderType, UtilityTerminal};
use af_db::StateDb;
use chrono::Utc;

fn sample_builder(id: &str) -> Builder {
    Builder {
        id: id.to_string(),
        name: format!("builder-{id}"),
        port: 9000,
        pid: 4242,
        session: format!("af-{id}"),
        builder_type: BuilderType::Task,
        status: BuilderStatus::Spawning,
        phase: String::new(),
        worktree_path: Some("/tmp/wt".to_string()),
        branch: Some("af/task-1".to_string()),
        task_text: Some("do the thing".to_string()),
        protocol_name: None,
        tracking_issue: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn upsert_and_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(&dir.path().join("state.db")).await.unwrap();

    let b = sample_builder("0001");
    db.upsert_builder(&b).await.unwrap();

    let state = db.load_state().await.unwrap();
    assert_eq!(state.builders.len(), 1);
    assert_eq!(state.builders[0].id, "0001");
    assert_eq!(state.builders[0].branch.as_deref(), Some("af/task-1"));
}

#[tokio::test]
async fn rename_and_status_update() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(&dir.path().join("state.db")).await.unwrap();

    db.upsert_builder(&sample_builder("0002")).await.unwrap();
    db.rename_builder("0002", "renamed").await.unwrap();
    db.set_builder_status("0002", BuilderStatus::Implementing)
        .await
        .unwrap();

    let state = db.load_state().await.unwrap();
    assert_eq!(state.builders[0].name, "renamed");
    assert_eq!(state.builders[0].status, BuilderStatus::Implementing);
}

#[tokio::test]
async fn delete_missing_builder_errors() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(&dir.path().join("state.db")).await.unwrap();
    assert!(db.delete_builder("nope").await.is_err());
}

#[tokio::test]
async fn try_add_util_rejects_duplicate_id() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(&dir.path().join("state.db")).await.unwrap();

    let util = UtilityTerminal {
        id: "util1".to_string(),
        name: "shell".to_string(),
        port: 9100,
        pid: 111,
        session: "af-util1".to_string(),
        worktree_path: None,
        created_at: Utc::now(),
    };

    assert!(db.try_add_util(&util).await.unwrap());
    assert!(!db.try_add_util(&util).await.unwrap());
}

#[tokio::test]
async fn retain_builders_prunes_dead_ids() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(&dir.path().join("state.db")).await.unwrap();

    db.upsert_builder(&sample_builder("0003")).await.unwrap();
    db.upsert_builder(&sample_builder("0004")).await.unwrap();

    let removed = db.retain_builders(&["0003".to_string()]).await.unwrap();
    assert_eq!(removed, vec!["0004".to_string()]);

    let state = db.load_state().await.unwrap();
    assert_eq!(state.builders.len(), 1);
    assert_eq!(state.builders[0].id, "0003");
}

#[tokio::test]
async fn clear_wipes_all_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(&dir.path().join("state.db")).await.unwrap();

    db.upsert_builder(&sample_builder("0005")).await.unwrap();
    db.clear().await.unwrap();

    let state = db.load_state().await.unwrap();
    assert!(state.builders.is_empty());
}
