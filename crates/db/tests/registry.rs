use af_db::RegistryDb;

#[tokio::test]
async fn register_rejects_conflicting_port() {
    let dir = tempfile::tempdir().unwrap();
    let db = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();

    db.register("/home/dev/project-a", 9000, 100).await.unwrap();
    let err = db.register("/home/dev/project-b", 9000, 200).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn register_allows_reclaiming_own_project() {
    let dir = tempfile::tempdir().unwrap();
    let db = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();

    db.register("/home/dev/project-a", 9000, 100).await.unwrap();
    db.register("/home/dev/project-a", 9010, 101).await.unwrap();

    let alloc = db.find_by_project("/home/dev/project-a").await.unwrap().unwrap();
    assert_eq!(alloc.base_port, 9010);
    assert_eq!(alloc.pid, 101);
}

#[tokio::test]
async fn cleanup_stale_removes_rows_whose_directory_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let db = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();

    let alive_project = tempfile::tempdir().unwrap();
    let alive_path = alive_project.path().to_str().unwrap().to_string();
    let gone_path = dir.path().join("never-existed").display().to_string();

    db.register(&alive_path, 9000, 100).await.unwrap();
    db.register(&gone_path, 9010, 200).await.unwrap();

    let removed = db.cleanup_stale().await.unwrap();
    assert_eq!(removed, vec![gone_path.clone()]);

    assert!(db.find_by_project(&gone_path).await.unwrap().is_none());
    assert!(db.find_by_project(&alive_path).await.unwrap().is_some());
}

#[tokio::test]
async fn get_or_allocate_is_idempotent_per_project() {
    let dir = tempfile::tempdir().unwrap();
    let db = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();

    let first = db.get_or_allocate("/home/dev/project-a", 100).await.unwrap();
    let second = db.get_or_allocate("/home/dev/project-a", 101).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first % 100, 0);
    assert!(first >= 4200);
}

#[tokio::test]
async fn get_or_allocate_hands_out_distinct_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let db = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();

    let a = db.get_or_allocate("/home/dev/project-a", 100).await.unwrap();
    let b = db.get_or_allocate("/home/dev/project-b", 200).await.unwrap();
    assert_ne!(a, b);
}
