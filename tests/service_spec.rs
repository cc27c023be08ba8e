use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use speculate2::speculate;
use tasklist::auth::Identity;
use tasklist::db::{Database, RepoError, RepoResult, TaskRepository};
use tasklist::models::*;
use tasklist::refresh::{RefreshError, RefreshSignal, ViewKey};
use tasklist::service::{FailureKind, MutationError, MutationSuccess, TaskService};
use uuid::Uuid;

// ============================================================
// Test collaborators
// ============================================================

/// Records every invalidated view.
#[derive(Clone, Default)]
struct RecordingSignal {
    views: Arc<Mutex<Vec<ViewKey>>>,
}

impl RecordingSignal {
    fn views(&self) -> Vec<ViewKey> {
        self.views.lock().unwrap().clone()
    }
}

impl RefreshSignal for RecordingSignal {
    fn invalidate(&self, view: &ViewKey) -> Result<(), RefreshError> {
        self.views.lock().unwrap().push(view.clone());
        Ok(())
    }
}

struct FailingSignal;

impl RefreshSignal for FailingSignal {
    fn invalidate(&self, _view: &ViewKey) -> Result<(), RefreshError> {
        Err(RefreshError::Unavailable)
    }
}

/// Counts every repository call before delegating.
#[derive(Clone)]
struct CountingRepo {
    inner: Database,
    calls: Arc<AtomicUsize>,
}

impl CountingRepo {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl TaskRepository for CountingRepo {
    fn insert(&self, task: &Task) -> RepoResult<Uuid> {
        self.tick();
        self.inner.insert(task)
    }

    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Task>> {
        self.tick();
        self.inner.find_by_id(id)
    }

    fn update(&self, id: Uuid, patch: &TaskPatch) -> RepoResult<()> {
        self.tick();
        self.inner.update(id, patch)
    }

    fn delete(&self, id: Uuid) -> RepoResult<()> {
        self.tick();
        self.inner.delete(id)
    }

    fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Task>> {
        self.tick();
        self.inner.list_by_owner(owner_id)
    }
}

/// Every call fails as if the database were unreachable.
struct FailingRepo;

impl TaskRepository for FailingRepo {
    fn insert(&self, _task: &Task) -> RepoResult<Uuid> {
        Err(RepoError::Unavailable("connection refused".to_string()))
    }

    fn find_by_id(&self, _id: Uuid) -> RepoResult<Option<Task>> {
        Err(RepoError::Unavailable("connection refused".to_string()))
    }

    fn update(&self, _id: Uuid, _patch: &TaskPatch) -> RepoResult<()> {
        Err(RepoError::Unavailable("connection refused".to_string()))
    }

    fn delete(&self, _id: Uuid) -> RepoResult<()> {
        Err(RepoError::Unavailable("connection refused".to_string()))
    }

    fn list_by_owner(&self, _owner_id: Uuid) -> RepoResult<Vec<Task>> {
        Err(RepoError::Unavailable("connection refused".to_string()))
    }
}

/// Where a concurrent delete from another session lands relative to the
/// ownership read.
#[derive(Clone, Copy)]
enum DeleteLands {
    BeforeRead,
    BetweenReadAndWrite,
}

struct RacingDelete {
    inner: Database,
    lands: DeleteLands,
}

impl TaskRepository for RacingDelete {
    fn insert(&self, task: &Task) -> RepoResult<Uuid> {
        self.inner.insert(task)
    }

    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Task>> {
        match self.lands {
            DeleteLands::BeforeRead => {
                self.inner.delete(id)?;
                self.inner.find_by_id(id)
            }
            DeleteLands::BetweenReadAndWrite => {
                let found = self.inner.find_by_id(id)?;
                self.inner.delete(id)?;
                Ok(found)
            }
        }
    }

    fn update(&self, id: Uuid, patch: &TaskPatch) -> RepoResult<()> {
        self.inner.update(id, patch)
    }

    fn delete(&self, id: Uuid) -> RepoResult<()> {
        self.inner.delete(id)
    }

    fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Task>> {
        self.inner.list_by_owner(owner_id)
    }
}

// ============================================================
// Helpers
// ============================================================

fn open_db() -> Database {
    let db = Database::open_memory().expect("Failed to create in-memory database");
    db.migrate().expect("Failed to run migrations");
    db
}

fn register(db: &Database, email: &str) -> Identity {
    let user = db
        .create_user("Test User", email, "hash")
        .expect("Failed to create user");
    Identity::new(user.id)
}

fn created_id(success: MutationSuccess) -> String {
    success
        .task_id
        .expect("create should report the new task id")
        .to_string()
}

fn load(db: &Database, id: &str) -> Option<Task> {
    db.find_by_id(Uuid::parse_str(id).unwrap()).unwrap()
}

fn assert_validation(err: MutationError, field: &str) {
    match err {
        MutationError::Validation { field_errors, .. } => {
            assert!(
                field_errors.get(field).is_some(),
                "expected an error on `{field}`, got {field_errors:?}"
            );
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

speculate! {
    before {
        let db = open_db();
        let alice = register(&db, "alice@example.com");
        let bob = register(&db, "bob@example.com");
        let refresh = RecordingSignal::default();
        let service = TaskService::new(db.clone(), refresh.clone());
    }

    describe "create" {
        it "stores a trimmed incomplete task owned by the caller" {
            let id = created_id(service.create(Some(&alice), "  Buy milk  ").unwrap());

            let task = load(&db, &id).expect("Task should be stored");
            assert_eq!(task.content, "Buy milk");
            assert_eq!(task.owner_id, alice.user_id);
            assert!(!task.completed);
            assert_eq!(task.created_at, task.updated_at);
        }

        it "accepts content at both length bounds" {
            for content in ["a".to_string(), "a".repeat(500), "任".repeat(500)] {
                let id = created_id(service.create(Some(&alice), &content).unwrap());
                assert_eq!(load(&db, &id).unwrap().content, content);
            }
        }

        it "stores content holding a NUL character" {
            let id = created_id(service.create(Some(&alice), "\u{0}milk").unwrap());
            assert_eq!(load(&db, &id).unwrap().content, "\u{0}milk");

            service.rename(Some(&alice), &id, "\u{0}oat milk").unwrap();
            assert_eq!(load(&db, &id).unwrap().content, "\u{0}oat milk");
        }

        it "rejects empty and oversized content without writing" {
            for content in [String::new(), "   ".to_string(), "a".repeat(501)] {
                let err = service.create(Some(&alice), &content).unwrap_err();
                assert_eq!(err.kind(), FailureKind::Validation);
                assert_validation(err, "content");
            }

            assert!(db.list_by_owner(alice.user_id).unwrap().is_empty());
            assert!(refresh.views().is_empty());
        }

        it "creates a new row on every call" {
            service.create(Some(&alice), "Buy milk").unwrap();
            service.create(Some(&alice), "Buy milk").unwrap();

            assert_eq!(db.list_by_owner(alice.user_id).unwrap().len(), 2);
        }

        it "invalidates the caller task list" {
            service.create(Some(&alice), "Buy milk").unwrap();

            assert_eq!(refresh.views(), vec![ViewKey::task_list(alice.user_id)]);
        }
    }

    describe "rename" {
        it "replaces content and advances updated_at" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());
            let before = load(&db, &id).unwrap();

            let result = service.rename(Some(&alice), &id, "Buy oat milk").unwrap();

            assert_eq!(result, MutationSuccess::done());
            let after = load(&db, &id).unwrap();
            assert_eq!(after.content, "Buy oat milk");
            assert!(after.updated_at > before.updated_at);
            assert_eq!(after.created_at, before.created_at);
        }

        it "rejects invalid content without writing" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            for content in [String::new(), "a".repeat(501)] {
                let err = service.rename(Some(&alice), &id, &content).unwrap_err();
                assert_validation(err, "content");
            }

            assert_eq!(load(&db, &id).unwrap().content, "Buy milk");
        }

        it "reports an empty id and bad content together" {
            let err = service.rename(Some(&alice), "", "").unwrap_err();

            match err {
                MutationError::Validation { field_errors, .. } => {
                    assert!(field_errors.get("id").is_some());
                    assert!(field_errors.get("content").is_some());
                }
                other => panic!("expected a validation error, got {other:?}"),
            }
        }

        it "hides tasks owned by someone else" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            let err = service.rename(Some(&bob), &id, "Mine now").unwrap_err();

            assert_eq!(err, MutationError::NotFound);
            assert_eq!(load(&db, &id).unwrap().content, "Buy milk");
        }
    }

    describe "toggle" {
        it "is idempotent and still advances updated_at" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            service.toggle(Some(&alice), &id, true).unwrap();
            let first = load(&db, &id).unwrap();
            service.toggle(Some(&alice), &id, true).unwrap();
            let second = load(&db, &id).unwrap();

            assert!(first.completed);
            assert!(second.completed);
            assert!(second.updated_at > first.updated_at);
        }

        it "can mark a task incomplete again" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            service.toggle(Some(&alice), &id, true).unwrap();
            service.toggle(Some(&alice), &id, false).unwrap();

            assert!(!load(&db, &id).unwrap().completed);
        }

        it "hides tasks owned by someone else" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            assert_eq!(service.toggle(Some(&bob), &id, true).unwrap_err(), MutationError::NotFound);
            assert!(!load(&db, &id).unwrap().completed);
        }
    }

    describe "delete" {
        it "removes the task and a second delete is not found" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            assert_eq!(service.delete(Some(&alice), &id).unwrap(), MutationSuccess::done());
            assert!(load(&db, &id).is_none());

            assert_eq!(service.delete(Some(&alice), &id).unwrap_err(), MutationError::NotFound);
        }

        it "hides tasks owned by someone else" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            assert_eq!(service.delete(Some(&bob), &id).unwrap_err(), MutationError::NotFound);
            assert!(load(&db, &id).is_some());
        }

        it "requires a task id" {
            assert_validation(service.delete(Some(&alice), "").unwrap_err(), "id");
        }
    }

    describe "missing tasks" {
        it "are not found for every operation" {
            let id = Uuid::new_v4().to_string();

            assert_eq!(service.rename(Some(&alice), &id, "x").unwrap_err(), MutationError::NotFound);
            assert_eq!(service.toggle(Some(&alice), &id, true).unwrap_err(), MutationError::NotFound);
            assert_eq!(service.delete(Some(&alice), &id).unwrap_err(), MutationError::NotFound);
            assert!(refresh.views().is_empty());
        }

        it "look the same whether absent or foreign" {
            let foreign = created_id(service.create(Some(&bob), "Bob's task").unwrap());
            let absent = Uuid::new_v4().to_string();

            let foreign_err = service.rename(Some(&alice), &foreign, "x").unwrap_err();
            let absent_err = service.rename(Some(&alice), &absent, "x").unwrap_err();

            assert_eq!(foreign_err.to_failure(), absent_err.to_failure());
        }

        it "include malformed ids" {
            let counting = CountingRepo { inner: db.clone(), calls: Arc::default() };
            let service = TaskService::new(counting.clone(), refresh.clone());

            assert_eq!(service.toggle(Some(&alice), "not-a-uuid", true).unwrap_err(), MutationError::NotFound);
            assert_eq!(counting.calls(), 0);
        }
    }

    describe "list" {
        it "returns only the caller tasks newest first" {
            service.create(Some(&alice), "first").unwrap();
            service.create(Some(&bob), "bob").unwrap();
            service.create(Some(&alice), "second").unwrap();

            let tasks = service.list(Some(&alice)).unwrap();

            let contents: Vec<_> = tasks.iter().map(|t| t.content.as_str()).collect();
            assert_eq!(contents, vec!["second", "first"]);
        }
    }

    describe "unauthenticated callers" {
        it "are rejected before validation or storage" {
            let counting = CountingRepo { inner: db.clone(), calls: Arc::default() };
            let service = TaskService::new(counting.clone(), refresh.clone());
            let id = Uuid::new_v4().to_string();

            assert_eq!(service.create(None, "").unwrap_err(), MutationError::Unauthenticated);
            assert_eq!(service.rename(None, &id, "x").unwrap_err(), MutationError::Unauthenticated);
            assert_eq!(service.toggle(None, &id, true).unwrap_err(), MutationError::Unauthenticated);
            assert_eq!(service.delete(None, &id).unwrap_err(), MutationError::Unauthenticated);
            assert_eq!(service.list(None).unwrap_err(), MutationError::Unauthenticated);

            assert_eq!(counting.calls(), 0);
            assert!(refresh.views().is_empty());
        }
    }

    describe "storage failures" {
        it "surface as a generic failure" {
            let service = TaskService::new(FailingRepo, refresh.clone());
            let id = Uuid::new_v4().to_string();

            let failure = service.create(Some(&alice), "Buy milk").unwrap_err().to_failure();
            assert_eq!(failure.kind, FailureKind::Storage);
            assert_eq!(failure.message, "Failed to add task");
            assert!(!failure.message.contains("connection refused"));

            let failure = service.toggle(Some(&alice), &id, true).unwrap_err().to_failure();
            assert_eq!(failure.message, "Failed to update task");

            let failure = service.delete(Some(&alice), &id).unwrap_err().to_failure();
            assert_eq!(failure.message, "Failed to delete task");

            assert!(refresh.views().is_empty());
        }
    }

    describe "refresh failures" {
        it "do not fail the mutation" {
            let service = TaskService::new(db.clone(), FailingSignal);

            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());
            service.rename(Some(&alice), &id, "Buy oat milk").unwrap();
            service.toggle(Some(&alice), &id, true).unwrap();
            service.delete(Some(&alice), &id).unwrap();

            assert!(load(&db, &id).is_none());
        }
    }

    describe "rename racing a delete" {
        it "is a lost write when the delete lands after the read" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());
            let racing = RacingDelete { inner: db.clone(), lands: DeleteLands::BetweenReadAndWrite };
            let service = TaskService::new(racing, refresh.clone());

            assert_eq!(service.rename(Some(&alice), &id, "Buy oat milk").unwrap(), MutationSuccess::done());
            assert!(load(&db, &id).is_none());
        }

        it "is not found when the delete lands before the read" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());
            let racing = RacingDelete { inner: db.clone(), lands: DeleteLands::BeforeRead };
            let service = TaskService::new(racing, refresh.clone());

            assert_eq!(service.rename(Some(&alice), &id, "Buy oat milk").unwrap_err(), MutationError::NotFound);
            assert!(load(&db, &id).is_none());
        }
    }

    describe "a full session" {
        it "follows the buy milk scenario" {
            let id = created_id(service.create(Some(&alice), "Buy milk").unwrap());

            let listed = service.list(Some(&alice)).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].content, "Buy milk");
            assert!(!listed[0].completed);

            assert_eq!(service.rename(Some(&bob), &id, "Hijacked").unwrap_err(), MutationError::NotFound);

            service.toggle(Some(&alice), &id, true).unwrap();
            assert!(load(&db, &id).unwrap().completed);

            service.delete(Some(&alice), &id).unwrap();
            assert_eq!(service.toggle(Some(&alice), &id, true).unwrap_err(), MutationError::NotFound);
        }
    }
}
