use skynote_core::{App, AppConfig, Note};

#[tokio::test]
async fn start_creates_missing_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("skynote").join("notes.sqlite3");
    let db_path_str = db_path.to_str().unwrap().to_string();
    let config = AppConfig::from_lookup(move |name: &str| match name {
        "SKYNOTE_DB_PATH" => Some(db_path_str.clone()),
        _ => None,
    })
    .unwrap();

    let app = App::start(&config).expect("app starts with a fresh data dir");
    app.store().insert_note(&Note::new("a", "b")).unwrap();

    assert!(db_path.exists());
    assert_eq!(app.store().list_notes().unwrap().len(), 1);
}
