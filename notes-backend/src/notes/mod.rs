//! Notes domain — the note model, the managed-backend clients, and the board.
//!
//! All persistence lives behind the Notes API (GraphQL) and the object-storage
//! service; this crate only holds the in-memory list the page renders from.

pub mod attachments;
pub mod board;
pub mod repository;

pub use board::NoteBoard;

use serde::Serialize;

/// A note as held in view state. The backend's single `image` field is split
/// here: `image_key` is the bare filename stored server-side, `image_url` the
/// resolved time-limited fetch URL (None when absent or resolution failed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_key: Option<String>,
    pub image_url: Option<String>,
}
