use skynote_core::{Note, NoteIntentError, NoteStateManager, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

async fn wait_for<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T
where
    T: Clone,
{
    timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for projection")
        .expect("projection sender dropped")
        .clone()
}

fn manager() -> NoteStateManager {
    let store = Arc::new(Store::open_in_memory().expect("open store"));
    NoteStateManager::new(store)
}

async fn insert_and_wait(manager: &NoteStateManager, title: &str, content: &str) -> Note {
    let mut all = manager.subscribe_all_notes();
    manager.insert(Note::new(title, content));
    let notes = wait_for(&mut all, |notes| notes.iter().any(|n| n.title == title)).await;
    notes
        .into_iter()
        .find(|n| n.title == title)
        .expect("inserted note is listed")
}

#[tokio::test]
async fn insert_then_delete_leaves_list_empty() {
    let manager = manager();
    let mut all = manager.subscribe_all_notes();

    let groceries = insert_and_wait(&manager, "Groceries", "Milk, eggs").await;
    assert!(groceries.id > 0);
    assert_eq!(groceries.content, "Milk, eggs");

    manager.delete(&groceries).expect("persisted note deletes");
    let notes = wait_for(&mut all, |notes| notes.is_empty()).await;
    assert!(notes.is_empty());
}

#[tokio::test]
async fn update_replaces_title_and_content() {
    let manager = manager();
    let mut all = manager.subscribe_all_notes();
    let draft = insert_and_wait(&manager, "Draft", "first").await;

    manager.update(draft.edited("Final", "second"));
    let notes = wait_for(&mut all, |notes| {
        notes.len() == 1 && notes[0].title == "Final"
    })
    .await;
    assert_eq!(notes[0].id, draft.id);
    assert_eq!(notes[0].content, "second");
}

#[tokio::test]
async fn deleting_unsaved_note_is_rejected() {
    let manager = manager();
    let unsaved = Note::new("Scratch", "never stored");

    assert_eq!(manager.delete(&unsaved), Err(NoteIntentError::NotPersisted));
}

#[tokio::test]
async fn newer_load_supersedes_previous_request() {
    let manager = manager();
    let first = insert_and_wait(&manager, "First", "one").await;
    let second = insert_and_wait(&manager, "Second", "two").await;
    let mut current = manager.subscribe_current_note();

    manager.load_note_by_id(first.id);
    manager.load_note_by_id(second.id);
    let loaded = wait_for(&mut current, |note| note.is_some()).await;
    assert_eq!(loaded, Some(second.clone()));

    // A later write to the superseded note must not leak into current_note.
    manager.update(first.edited("First edited", "one more"));
    let mut all = manager.subscribe_all_notes();
    wait_for(&mut all, |notes| notes.iter().any(|n| n.title == "First edited")).await;
    assert_eq!(manager.current_note(), Some(second));
}

#[tokio::test]
async fn current_note_follows_deletion() {
    let manager = manager();
    let note = insert_and_wait(&manager, "Ephemeral", "soon gone").await;
    let mut current = manager.subscribe_current_note();

    manager.load_note_by_id(note.id);
    wait_for(&mut current, |loaded| loaded.as_ref() == Some(&note)).await;

    manager.delete(&note).expect("persisted note deletes");
    let loaded = wait_for(&mut current, |loaded| loaded.is_none()).await;
    assert_eq!(loaded, None);
}

#[tokio::test]
async fn loading_a_deleted_note_yields_none() {
    let manager = manager();
    let mut all = manager.subscribe_all_notes();
    let note = insert_and_wait(&manager, "Groceries", "Milk, eggs").await;

    manager.delete(&note).expect("persisted note deletes");
    wait_for(&mut all, |notes| notes.is_empty()).await;

    manager.load_note_by_id(note.id);
    // Give the live query time to run against the emptied table.
    for _ in 0..20 {
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.current_note(), None);
}

#[tokio::test]
async fn search_filters_and_tracks_new_notes() {
    let manager = manager();
    insert_and_wait(&manager, "Groceries", "Milk, eggs").await;
    insert_and_wait(&manager, "Gym", "legs day").await;
    let mut results = manager.subscribe_search_results();

    manager.search("MILK");
    let found = wait_for(&mut results, |notes| notes.len() == 1).await;
    assert_eq!(found[0].title, "Groceries");

    manager.insert(Note::new("Bakery", "oat milk bread"));
    let found = wait_for(&mut results, |notes| notes.len() == 2).await;
    assert!(found.iter().all(|n| n.title != "Gym"));

    manager.search("");
    wait_for(&mut results, |notes| notes.len() == 3).await;
}
