//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide note CRUD and predicate search over `note_table`.
//!
//! # Invariants
//! - Insert is "insert if absent": an existing id is left untouched.
//! - Update and delete are keyed by id and are no-ops for unknown ids.
//! - List and search are ordered by `timestamp DESC, id DESC`.

use crate::model::note::{Note, NoteId, UNSAVED_NOTE_ID};
use crate::repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};

const NOTE_SELECT_SQL: &str = "SELECT id, title, content, timestamp FROM note_table";
const NOTE_ORDER_SQL: &str = "ORDER BY timestamp DESC, id DESC";

static LIKE_SPECIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\\%_])").expect("valid like escape regex"));

/// Repository interface for note operations.
pub trait NoteRepository {
    /// Inserts a note; returns the stored id, or `None` when the id already
    /// existed and the write was ignored.
    fn insert_note(&self, note: &Note) -> RepoResult<Option<NoteId>>;
    /// Replaces title/content/timestamp of the row with `note.id`.
    fn update_note(&self, note: &Note) -> RepoResult<bool>;
    /// Removes the row with `id`.
    fn delete_note(&self, id: NoteId) -> RepoResult<bool>;
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    fn list_notes(&self) -> RepoResult<Vec<Note>>;
    /// Case-insensitive substring search over title and content.
    fn search_notes(&self, query: &str) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<Option<NoteId>> {
        let id = if note.id == UNSAVED_NOTE_ID {
            None
        } else {
            Some(note.id)
        };
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO note_table (id, title, content, timestamp)
             VALUES (?1, ?2, ?3, ?4);",
            params![id, note.title.as_str(), note.content.as_str(), note.timestamp],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn update_note(&self, note: &Note) -> RepoResult<bool> {
        if note.id == UNSAVED_NOTE_ID {
            return Ok(false);
        }
        let changed = self.conn.execute(
            "UPDATE note_table
             SET title = ?2, content = ?3, timestamp = ?4
             WHERE id = ?1;",
            params![note.id, note.title.as_str(), note.content.as_str(), note.timestamp],
        )?;
        Ok(changed > 0)
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM note_table WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("{NOTE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_note_row,
            )
            .optional()?;
        note.map(validate_note).transpose()
    }

    fn list_notes(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} {NOTE_ORDER_SQL};"))?;
        let rows = stmt.query_map([], parse_note_row)?;
        collect_notes(rows)
    }

    fn search_notes(&self, query: &str) -> RepoResult<Vec<Note>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return self.list_notes();
        }

        let pattern = format!("%{}%", escape_like(trimmed));
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE title LIKE ?1 ESCAPE '\\'
                OR content LIKE ?1 ESCAPE '\\'
             {NOTE_ORDER_SQL};"
        ))?;
        let rows = stmt.query_map([pattern], parse_note_row)?;
        collect_notes(rows)
    }
}

/// Escapes `LIKE` wildcards so user text matches literally.
pub fn escape_like(value: &str) -> String {
    LIKE_SPECIAL_RE.replace_all(value, r"\$1").into_owned()
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        timestamp: row.get("timestamp")?,
    })
}

fn validate_note(note: Note) -> RepoResult<Note> {
    if note.id <= UNSAVED_NOTE_ID {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{}` in note_table.id",
            note.id
        )));
    }
    Ok(note)
}

fn collect_notes(
    rows: impl Iterator<Item = rusqlite::Result<Note>>,
) -> RepoResult<Vec<Note>> {
    let mut notes = Vec::new();
    for row in rows {
        notes.push(validate_note(row?)?);
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_escapes_wildcards_and_backslash() {
        assert_eq!(escape_like("50%_off\\"), r"50\%\_off\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
