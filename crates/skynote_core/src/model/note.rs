//! Note and last-city records.
//!
//! # Responsibility
//! - Define the two persisted shapes shared by store, repositories and managers.
//!
//! # Invariants
//! - `id == UNSAVED_NOTE_ID` means "not yet persisted"; the store assigns the
//!   real id on insert and it never changes afterwards.
//! - `timestamp` is epoch milliseconds, set on creation and refreshed on edit.
//! - Only one `LastCity` row exists; its id is always `LAST_CITY_SLOT_ID`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Store-assigned note identity.
pub type NoteId = i64;

/// Sentinel id carried by notes that were never inserted.
pub const UNSAVED_NOTE_ID: NoteId = 0;

/// Fixed primary key of the single last-city slot.
pub const LAST_CITY_SLOT_ID: i64 = 0;

/// One user note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Creation/modification instant in epoch milliseconds.
    pub timestamp: i64,
}

impl Note {
    /// Creates an unsaved note stamped with the current time.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: UNSAVED_NOTE_ID,
            title: title.into(),
            content: content.into(),
            timestamp: now_epoch_ms(),
        }
    }

    /// Returns a full-replacement copy for `update`, keeping identity and
    /// refreshing the timestamp.
    pub fn edited(&self, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: self.id,
            title: title.into(),
            content: content.into(),
            timestamp: now_epoch_ms(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_NOTE_ID
    }
}

/// Most recently searched weather city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCity {
    pub id: i64,
    pub city: String,
}

impl LastCity {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            id: LAST_CITY_SLOT_ID,
            city: city.into(),
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
