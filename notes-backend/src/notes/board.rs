//! NoteBoard — the single piece of view state and the orchestration around it.
//!
//! Holds the in-memory note list the page renders from. Every user action
//! maps to one method: `refresh` (list + resolve image URLs), `create`
//! (upload, create, re-fetch), `delete` (optimistic local removal, then
//! storage + backend deletes). The list is only ever replaced wholesale.

use futures_util::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;

use super::Note;
use super::attachments::{self, AttachmentStore};
use super::repository::{NoteDraft, NoteRepository};
use crate::telemetry::{OpOutcome, OpsSink};

/// Result of a create. `image_degraded` is set when the attachment upload
/// failed and the note was created without it — the page shows a warning
/// instead of silently dropping the image.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub image_degraded: bool,
}

/// Result of a delete. The local list is already updated by the time this is
/// returned; on `Failed` the caller decides whether to resync.
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Failed { error: String },
}

pub struct NoteBoard {
    repo: Arc<dyn NoteRepository>,
    attachments: Arc<dyn AttachmentStore>,
    ops: Arc<dyn OpsSink>,
    notes: RwLock<Vec<Note>>,
}

impl NoteBoard {
    pub fn new(
        repo: Arc<dyn NoteRepository>,
        attachments: Arc<dyn AttachmentStore>,
        ops: Arc<dyn OpsSink>,
    ) -> Self {
        Self {
            repo,
            attachments,
            ops,
            notes: RwLock::new(Vec::new()),
        }
    }

    /// Clone of the current list, in backend order.
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.read().clone()
    }

    /// Re-fetch the list and resolve image URLs, replacing the list wholesale.
    ///
    /// URL resolutions run concurrently across notes; a failure in one is
    /// caught per-note (that note renders without an image) and never affects
    /// the others. If the list fetch itself fails, the prior list is left
    /// intact and the error propagates.
    pub async fn refresh(&self) -> Result<Vec<Note>, String> {
        let records = self.repo.list_notes().await?;

        let resolved = join_all(records.into_iter().map(|record| {
            let attachments = Arc::clone(&self.attachments);
            async move {
                // The store reports the resolution failure; here it only
                // degrades this note's display.
                let image_url = match &record.image {
                    Some(key) => attachments.resolve_url(key).await.ok(),
                    None => None,
                };
                Note {
                    id: record.id,
                    name: record.name,
                    description: record.description,
                    image_key: record.image,
                    image_url,
                }
            }
        }))
        .await;

        *self.notes.write() = resolved.clone();
        Ok(resolved)
    }

    /// Create a note, uploading the attachment first when one is present.
    ///
    /// An upload failure does not block creation: the note is created without
    /// an image key (no dangling reference) and the outcome reports the
    /// degradation. A create failure propagates with the list untouched.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        attachment: Option<(String, Vec<u8>)>,
    ) -> Result<CreateOutcome, String> {
        let mut image_degraded = false;
        let image = match attachment {
            Some((filename, bytes)) => {
                attachments::validate_filename(&filename)?;
                match self.attachments.upload(&filename, bytes).await {
                    Ok(()) => Some(filename),
                    Err(_) => {
                        // Already reported by the store; surfaced to the
                        // caller through the outcome instead.
                        image_degraded = true;
                        None
                    }
                }
            }
            None => None,
        };

        let draft = NoteDraft {
            name: name.to_string(),
            description: description.to_string(),
            image,
        };
        self.repo.create_note(&draft).await?;

        // The backend assigns the id; a full re-fetch is how we observe it.
        self.refresh().await?;

        Ok(CreateOutcome { image_degraded })
    }

    /// Delete a note, removing it from the local list immediately.
    ///
    /// The attachment removal failure is swallowed (recorded as a possible
    /// orphaned object). A backend delete failure is returned as `Failed`;
    /// the caller owns the resync policy.
    pub async fn delete(&self, id: &str) -> DeleteOutcome {
        let removed = {
            let mut notes = self.notes.write();
            match notes.iter().position(|n| n.id == id) {
                Some(index) => Some(notes.remove(index)),
                None => None,
            }
        };

        let Some(note) = removed else {
            return DeleteOutcome::NotFound;
        };

        if let Some(key) = &note.image_key {
            if let Err(e) = self.attachments.remove(key).await {
                // The note record is deleted regardless, leaving the stored
                // object behind — record the orphan, not the remove failure
                // (the store already reported that).
                self.ops.event(
                    "attachment_orphaned",
                    OpOutcome::Failed,
                    &format!("note={} key={} error={}", id, key, e),
                );
            }
        }

        match self.repo.delete_note(id).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(error) => DeleteOutcome::Failed { error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::repository::NoteRecord;
    use crate::telemetry::RecordingSink;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Shared call journal so tests can assert ordering across the repository
    /// and the attachment store.
    type Journal = Arc<Mutex<Vec<String>>>;

    struct FakeRepo {
        journal: Journal,
        records: Mutex<Vec<NoteRecord>>,
        created: Mutex<Vec<NoteDraft>>,
        deleted: Mutex<Vec<String>>,
        next_id: AtomicUsize,
        fail_list: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl FakeRepo {
        fn new(journal: Journal, records: Vec<NoteRecord>) -> Self {
            Self {
                journal,
                records: Mutex::new(records),
                created: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(1),
                fail_list: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl NoteRepository for FakeRepo {
        async fn list_notes(&self) -> Result<Vec<NoteRecord>, String> {
            self.journal.lock().unwrap().push("list_notes".to_string());
            if self.fail_list.load(Ordering::SeqCst) {
                return Err("network down".to_string());
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn create_note(&self, draft: &NoteDraft) -> Result<(), String> {
            self.journal.lock().unwrap().push("create_note".to_string());
            self.created.lock().unwrap().push(draft.clone());
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.records.lock().unwrap().push(NoteRecord {
                id: format!("n-{}", id),
                name: draft.name.clone(),
                description: draft.description.clone(),
                image: draft.image.clone(),
            });
            Ok(())
        }

        async fn delete_note(&self, id: &str) -> Result<(), String> {
            self.journal.lock().unwrap().push(format!("delete_note {}", id));
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err("backend delete refused".to_string());
            }
            self.deleted.lock().unwrap().push(id.to_string());
            self.records.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }
    }

    struct FakeStore {
        journal: Journal,
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_upload: AtomicBool,
        fail_remove: AtomicBool,
        unresolvable: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new(journal: Journal) -> Self {
            Self {
                journal,
                objects: Mutex::new(HashMap::new()),
                fail_upload: AtomicBool::new(false),
                fail_remove: AtomicBool::new(false),
                unresolvable: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AttachmentStore for FakeStore {
        async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<(), String> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("upload {}", attachments::object_path(filename)));
            if self.fail_upload.load(Ordering::SeqCst) {
                return Err("storage refused upload".to_string());
            }
            self.objects.lock().unwrap().insert(filename.to_string(), bytes);
            Ok(())
        }

        async fn resolve_url(&self, filename: &str) -> Result<String, String> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("resolve {}", attachments::object_path(filename)));
            if self.unresolvable.lock().unwrap().contains(&filename.to_string()) {
                return Err("object missing".to_string());
            }
            Ok(format!("https://cdn.test/{}?sig=abc", attachments::object_path(filename)))
        }

        async fn remove(&self, filename: &str) -> Result<(), String> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("remove {}", attachments::object_path(filename)));
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err("storage refused remove".to_string());
            }
            self.objects.lock().unwrap().remove(filename);
            Ok(())
        }
    }

    fn record(id: &str, name: &str, description: &str, image: Option<&str>) -> NoteRecord {
        NoteRecord {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            image: image.map(|s| s.to_string()),
        }
    }

    struct Rig {
        board: NoteBoard,
        repo: Arc<FakeRepo>,
        store: Arc<FakeStore>,
        ops: Arc<RecordingSink>,
        journal: Journal,
    }

    fn rig(records: Vec<NoteRecord>) -> Rig {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let repo = Arc::new(FakeRepo::new(Arc::clone(&journal), records));
        let store = Arc::new(FakeStore::new(Arc::clone(&journal)));
        let ops = Arc::new(RecordingSink::new());
        let board = NoteBoard::new(
            Arc::clone(&repo) as Arc<dyn NoteRepository>,
            Arc::clone(&store) as Arc<dyn AttachmentStore>,
            Arc::clone(&ops) as Arc<dyn OpsSink>,
        );
        Rig { board, repo, store, ops, journal }
    }

    #[tokio::test]
    async fn test_refresh_without_images_makes_no_storage_call() {
        let r = rig(vec![
            record("a", "One", "first", None),
            record("b", "Two", "second", None),
        ]);

        let notes = r.board.refresh().await.unwrap();
        assert_eq!(notes.len(), 2);

        let journal = r.journal.lock().unwrap();
        assert!(journal.iter().all(|call| !call.starts_with("resolve")));
    }

    #[tokio::test]
    async fn test_failed_resolution_is_isolated_per_note() {
        let r = rig(vec![
            record("a", "One", "first", Some("a.jpg")),
            record("b", "Two", "second", Some("b.jpg")),
        ]);
        r.store.unresolvable.lock().unwrap().push("b.jpg".to_string());

        let notes = r.board.refresh().await.unwrap();

        let a = notes.iter().find(|n| n.id == "a").unwrap();
        let b = notes.iter().find(|n| n.id == "b").unwrap();
        assert!(a.image_url.is_some());
        assert!(b.image_url.is_none());
        assert_eq!(b.image_key.as_deref(), Some("b.jpg"));
        // Resolution failures are reported by the store layer, not repeated here
        assert_eq!(r.ops.failures_for("resolve_image_url"), 0);
    }

    #[tokio::test]
    async fn test_create_without_file_sends_null_image_and_skips_storage() {
        let r = rig(vec![]);

        let outcome = r.board.create("N", "D", None).await.unwrap();
        assert!(!outcome.image_degraded);

        let created = r.repo.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0].image.is_none());

        let journal = r.journal.lock().unwrap();
        assert!(journal.iter().all(|call| !call.starts_with("upload")));
    }

    #[tokio::test]
    async fn test_create_with_file_uploads_before_creation() {
        let r = rig(vec![]);

        let outcome = r
            .board
            .create("Trip", "Paris", Some(("paris.jpg".to_string(), b"B".to_vec())))
            .await
            .unwrap();
        assert!(!outcome.image_degraded);

        // Upload lands at the conventioned path with the right bytes
        assert_eq!(
            r.store.objects.lock().unwrap().get("paris.jpg"),
            Some(&b"B".to_vec())
        );

        // Ordering: upload, then create, then the re-fetch resolves the URL
        let journal = r.journal.lock().unwrap();
        let upload_at = journal
            .iter()
            .position(|c| c == "upload public/album/2024/paris.jpg")
            .expect("upload call missing");
        let create_at = journal
            .iter()
            .position(|c| c == "create_note")
            .expect("create call missing");
        assert!(upload_at < create_at);

        let created = r.repo.created.lock().unwrap();
        assert_eq!(created[0].image.as_deref(), Some("paris.jpg"));

        // The re-fetched note carries a resolved URL
        let notes = r.board.snapshot();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].image_url.is_some());
    }

    #[tokio::test]
    async fn test_create_round_trip_without_image() {
        let r = rig(vec![]);

        r.board.create("N", "D", None).await.unwrap();

        let notes = r.board.snapshot();
        let matches: Vec<_> = notes
            .iter()
            .filter(|n| n.name == "N" && n.description == "D")
            .collect();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].image_key.is_none());
        assert!(matches[0].image_url.is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_degrades_visibly() {
        let r = rig(vec![]);
        r.store.fail_upload.store(true, Ordering::SeqCst);

        let outcome = r
            .board
            .create("Trip", "Paris", Some(("paris.jpg".to_string(), b"B".to_vec())))
            .await
            .unwrap();
        assert!(outcome.image_degraded);

        // Note created without a dangling image reference
        let created = r.repo.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0].image.is_none());
        // Upload failures are reported by the store layer, not repeated here
        assert_eq!(r.ops.failures_for("upload_image"), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_traversal_filename() {
        let r = rig(vec![]);
        let err = r
            .board
            .create("X", "Y", Some(("../evil.png".to_string(), b"x".to_vec())))
            .await
            .unwrap_err();
        assert!(err.contains("Invalid attachment filename"));
        assert!(r.repo.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_optimistic_even_when_backend_fails() {
        let r = rig(vec![record("a", "One", "first", None)]);
        r.board.refresh().await.unwrap();
        r.repo.fail_delete.store(true, Ordering::SeqCst);

        let outcome = r.board.delete("a").await;
        assert!(matches!(outcome, DeleteOutcome::Failed { .. }));

        // Removed locally before the backend answered
        assert!(r.board.snapshot().is_empty());
        // The repository client owns the delete-failure report
        assert_eq!(r.ops.failures_for("delete_note"), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_attachment_then_record() {
        let r = rig(vec![record("a", "Trip", "Paris", Some("paris.jpg"))]);
        r.board.refresh().await.unwrap();

        let outcome = r.board.delete("a").await;
        assert!(matches!(outcome, DeleteOutcome::Deleted));

        let journal = r.journal.lock().unwrap();
        let remove_at = journal
            .iter()
            .position(|c| c == "remove public/album/2024/paris.jpg")
            .expect("remove call missing");
        let delete_at = journal
            .iter()
            .position(|c| c == "delete_note a")
            .expect("delete call missing");
        assert!(remove_at < delete_at);
    }

    #[tokio::test]
    async fn test_delete_survives_attachment_removal_failure() {
        let r = rig(vec![record("a", "Trip", "Paris", Some("paris.jpg"))]);
        r.board.refresh().await.unwrap();
        r.store.fail_remove.store(true, Ordering::SeqCst);

        let outcome = r.board.delete("a").await;
        assert!(matches!(outcome, DeleteOutcome::Deleted));
        assert_eq!(r.repo.deleted.lock().unwrap().as_slice(), &["a".to_string()]);
        // The orphaned object is recorded once, under its own op
        assert_eq!(r.ops.failures_for("attachment_orphaned"), 1);
        assert_eq!(r.ops.failures_for("remove_image"), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_found() {
        let r = rig(vec![]);
        let outcome = r.board.delete("missing").await;
        assert!(matches!(outcome, DeleteOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_prior_list_intact() {
        let r = rig(vec![record("a", "One", "first", None)]);
        r.board.refresh().await.unwrap();
        assert_eq!(r.board.snapshot().len(), 1);

        r.repo.fail_list.store(true, Ordering::SeqCst);
        let err = r.board.refresh().await.unwrap_err();
        assert!(err.contains("network down"));
        assert_eq!(r.board.snapshot().len(), 1);
    }
}
