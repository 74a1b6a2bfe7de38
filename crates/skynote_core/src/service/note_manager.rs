//! Note state manager.
//!
//! # Responsibility
//! - Publish live projections of all notes, one selected note and one
//!   search result set.
//! - Forward note mutations to the store without blocking the caller.
//!
//! # Invariants
//! - At most one live subscription exists per projection kind; opening a new
//!   one cancels the previous one first.
//! - Mutations report nothing back; their effects arrive through the live
//!   projections. Storage failures are logged and end that write.

use crate::model::note::{Note, NoteId};
use crate::store::{replace_subscription, CancelToken, Store, Subscription};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Rejected user intent. Surfaced as a notice; no state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteIntentError {
    /// The note was never saved, so there is nothing to delete.
    NotPersisted,
}

impl Display for NoteIntentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPersisted => write!(f, "cannot delete a note that has not been saved"),
        }
    }
}

impl Error for NoteIntentError {}

pub struct NoteStateManager {
    store: Arc<Store>,
    all_notes: Arc<watch::Sender<Vec<Note>>>,
    current_note: Arc<watch::Sender<Option<Note>>>,
    search_results: Arc<watch::Sender<Vec<Note>>>,
    _all_notes_subscription: Subscription,
    current_subscription: Mutex<Option<Subscription>>,
    search_subscription: Mutex<Option<Subscription>>,
}

impl NoteStateManager {
    /// Creates the manager and opens the all-notes live query.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(store: Arc<Store>) -> Self {
        let (all_notes, _) = watch::channel(Vec::new());
        let (current_note, _) = watch::channel(None);
        let (search_results, _) = watch::channel(Vec::new());
        let all_notes = Arc::new(all_notes);

        let all_notes_subscription =
            store.live_all_notes(Arc::clone(&all_notes), CancelToken::new());

        Self {
            store,
            all_notes,
            current_note: Arc::new(current_note),
            search_results: Arc::new(search_results),
            _all_notes_subscription: all_notes_subscription,
            current_subscription: Mutex::new(None),
            search_subscription: Mutex::new(None),
        }
    }

    /// Live list of every note, newest first.
    pub fn subscribe_all_notes(&self) -> watch::Receiver<Vec<Note>> {
        self.all_notes.subscribe()
    }

    /// Live view of the note requested by the latest `load_note_by_id`.
    pub fn subscribe_current_note(&self) -> watch::Receiver<Option<Note>> {
        self.current_note.subscribe()
    }

    /// Live results of the latest `search`.
    pub fn subscribe_search_results(&self) -> watch::Receiver<Vec<Note>> {
        self.search_results.subscribe()
    }

    pub fn all_notes(&self) -> Vec<Note> {
        self.all_notes.borrow().clone()
    }

    pub fn current_note(&self) -> Option<Note> {
        self.current_note.borrow().clone()
    }

    /// Points `current_note` at `id`, superseding any earlier request.
    pub fn load_note_by_id(&self, id: NoteId) {
        let mut slot = self
            .current_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        replace_subscription(&mut slot, &self.current_note, |current| {
            current.take().is_some()
        });
        *slot = Some(self.store.live_note(
            id,
            Arc::clone(&self.current_note),
            CancelToken::new(),
        ));
        debug!("event=note_load module=service status=subscribed note_id={id}");
    }

    /// Filters notes by case-insensitive substring; blank shows everything.
    pub fn search(&self, query: impl Into<String>) {
        let query = query.into();
        let mut slot = self
            .search_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        replace_subscription(&mut slot, &self.search_results, |_| false);
        *slot = Some(self.store.live_search(
            query,
            Arc::clone(&self.search_results),
            CancelToken::new(),
        ));
    }

    /// Stores `note`; an already-used id makes this a silent no-op.
    pub fn insert(&self, note: Note) {
        self.spawn_write("insert", move |store| match store.insert_note(&note) {
            Ok(Some(id)) => info!("event=note_write module=service op=insert status=ok note_id={id}"),
            Ok(None) => info!(
                "event=note_write module=service op=insert status=ignored note_id={}",
                note.id
            ),
            Err(err) => error!("event=note_write module=service op=insert status=error error={err}"),
        });
    }

    /// Replaces the stored note with the same id; unknown ids are ignored.
    pub fn update(&self, note: Note) {
        self.spawn_write("update", move |store| match store.update_note(&note) {
            Ok(changed) => info!(
                "event=note_write module=service op=update status={} note_id={}",
                outcome(changed),
                note.id
            ),
            Err(err) => error!(
                "event=note_write module=service op=update status=error note_id={} error={}",
                note.id, err
            ),
        });
    }

    /// Removes `note` by id.
    ///
    /// # Errors
    /// - `NotPersisted` when `note` was never saved; nothing is written.
    pub fn delete(&self, note: &Note) -> Result<(), NoteIntentError> {
        if !note.is_persisted() {
            return Err(NoteIntentError::NotPersisted);
        }

        let id = note.id;
        self.spawn_write("delete", move |store| match store.delete_note(id) {
            Ok(changed) => info!(
                "event=note_write module=service op=delete status={} note_id={}",
                outcome(changed),
                id
            ),
            Err(err) => error!(
                "event=note_write module=service op=delete status=error note_id={id} error={err}"
            ),
        });
        Ok(())
    }

    fn spawn_write(&self, op: &'static str, write: impl FnOnce(&Store) + Send + 'static) {
        let store = Arc::clone(&self.store);
        debug!("event=note_write module=service op={op} status=start");
        drop(tokio::task::spawn_blocking(move || write(&store)));
    }
}

fn outcome(changed: bool) -> &'static str {
    if changed {
        "ok"
    } else {
        "noop"
    }
}
