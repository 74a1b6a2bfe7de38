//! Persistent store: one shared SQLite connection plus change notification.
//!
//! # Responsibility
//! - Serialize all reads/writes through a single connection.
//! - Notify live queries after every write that changed a table.
//! - Run live queries as background tasks feeding `watch` sinks.
//!
//! # Invariants
//! - A note-table notification is sent only when a row changed.
//! - Every last-city upsert notifies; the live query dedups equal values.
//! - Live queries must be opened from inside a Tokio runtime.

mod live;

pub use live::{replace_subscription, CancelToken, Subscription};

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::model::note::{LastCity, Note, NoteId};
use crate::repo::last_city_repo::{LastCityRepository, SqliteLastCityRepository};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::RepoResult;
use log::{debug, error};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Notes,
    LastCity,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::Notes => "note_table",
            Self::LastCity => "last_city_table",
        }
    }
}

pub struct Store {
    conn: Mutex<Connection>,
    notes_changed: watch::Sender<u64>,
    last_city_changed: watch::Sender<u64>,
}

impl Store {
    /// Wraps a connection that already has the current schema.
    pub fn new(conn: Connection) -> Self {
        let (notes_changed, _) = watch::channel(0);
        let (last_city_changed, _) = watch::channel(0);
        Self {
            conn: Mutex::new(conn),
            notes_changed,
            last_city_changed,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Inserts `note` unless its id already exists. Returns the stored id.
    pub fn insert_note(&self, note: &Note) -> RepoResult<Option<NoteId>> {
        let inserted = self.with_conn(|conn| SqliteNoteRepository::new(conn).insert_note(note))?;
        if inserted.is_some() {
            self.touch(Table::Notes);
        }
        Ok(inserted)
    }

    pub fn update_note(&self, note: &Note) -> RepoResult<bool> {
        let changed = self.with_conn(|conn| SqliteNoteRepository::new(conn).update_note(note))?;
        if changed {
            self.touch(Table::Notes);
        }
        Ok(changed)
    }

    pub fn delete_note(&self, id: NoteId) -> RepoResult<bool> {
        let changed = self.with_conn(|conn| SqliteNoteRepository::new(conn).delete_note(id))?;
        if changed {
            self.touch(Table::Notes);
        }
        Ok(changed)
    }

    pub fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.with_conn(|conn| SqliteNoteRepository::new(conn).get_note(id))
    }

    pub fn list_notes(&self) -> RepoResult<Vec<Note>> {
        self.with_conn(|conn| SqliteNoteRepository::new(conn).list_notes())
    }

    pub fn search_notes(&self, query: &str) -> RepoResult<Vec<Note>> {
        self.with_conn(|conn| SqliteNoteRepository::new(conn).search_notes(query))
    }

    pub fn upsert_last_city(&self, city: &str) -> RepoResult<()> {
        self.with_conn(|conn| SqliteLastCityRepository::new(conn).upsert_last_city(city))?;
        self.touch(Table::LastCity);
        Ok(())
    }

    pub fn get_last_city(&self) -> RepoResult<Option<LastCity>> {
        self.with_conn(|conn| SqliteLastCityRepository::new(conn).get_last_city())
    }

    /// Keeps `sink` equal to the full note list until `token` is cancelled.
    pub fn live_all_notes(
        self: &Arc<Self>,
        sink: Arc<watch::Sender<Vec<Note>>>,
        token: CancelToken,
    ) -> Subscription {
        self.spawn_live(Table::Notes, "all_notes", sink, token, |store| {
            store.list_notes()
        })
    }

    /// Keeps `sink` equal to the note with `id` (or `None`).
    pub fn live_note(
        self: &Arc<Self>,
        id: NoteId,
        sink: Arc<watch::Sender<Option<Note>>>,
        token: CancelToken,
    ) -> Subscription {
        self.spawn_live(Table::Notes, "note_by_id", sink, token, move |store| {
            store.get_note(id)
        })
    }

    /// Keeps `sink` equal to the notes matching `query`.
    pub fn live_search(
        self: &Arc<Self>,
        query: String,
        sink: Arc<watch::Sender<Vec<Note>>>,
        token: CancelToken,
    ) -> Subscription {
        self.spawn_live(Table::Notes, "note_search", sink, token, move |store| {
            store.search_notes(&query)
        })
    }

    /// Keeps `sink` equal to the last-city slot.
    pub fn live_last_city(
        self: &Arc<Self>,
        sink: Arc<watch::Sender<Option<LastCity>>>,
        token: CancelToken,
    ) -> Subscription {
        self.spawn_live(Table::LastCity, "last_city", sink, token, |store| {
            store.get_last_city()
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    fn notifier(&self, table: Table) -> &watch::Sender<u64> {
        match table {
            Table::Notes => &self.notes_changed,
            Table::LastCity => &self.last_city_changed,
        }
    }

    fn touch(&self, table: Table) {
        self.notifier(table)
            .send_modify(|version| *version = version.wrapping_add(1));
        debug!(
            "event=store_changed module=store table={}",
            table.name()
        );
    }

    fn spawn_live<T, Q>(
        self: &Arc<Self>,
        table: Table,
        query_name: &'static str,
        sink: Arc<watch::Sender<T>>,
        token: CancelToken,
        query: Q,
    ) -> Subscription
    where
        T: PartialEq + Send + Sync + 'static,
        Q: Fn(&Store) -> RepoResult<T> + Send + Sync + 'static,
    {
        let store = Arc::clone(self);
        let mut changes = self.notifier(table).subscribe();
        let query = Arc::new(query);
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            loop {
                changes.borrow_and_update();

                let query_store = Arc::clone(&store);
                let run = Arc::clone(&query);
                let snapshot = match tokio::task::spawn_blocking(move || run(&query_store)).await {
                    Ok(Ok(snapshot)) => snapshot,
                    Ok(Err(err)) => {
                        error!(
                            "event=live_query module=store status=error query={} error={}",
                            query_name, err
                        );
                        break;
                    }
                    Err(err) => {
                        error!(
                            "event=live_query module=store status=error query={} error_code=query_task_failed error={}",
                            query_name, err
                        );
                        break;
                    }
                };

                if !live::publish(&sink, &task_token, snapshot) {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
            debug!(
                "event=live_query module=store status=stopped query={}",
                query_name
            );
        });

        Subscription::new(token, task.abort_handle())
    }
}
