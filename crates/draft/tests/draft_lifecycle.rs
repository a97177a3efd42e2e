//! Draft lifecycle against a real store and dispatcher.
//!
//! Debounce timing is driven by `ManualTimer`, so every test is deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use onyx_dispatch::{
    DispatchConfig, Mutation, MutationDispatcher, Outcome, RetryPolicy, ScriptedTransport,
};
use onyx_draft::{
    draft_key, CommitOutcome, DraftConfig, DraftContent, DraftManager, DraftState, FocusTarget,
    ManualTimer,
};
use onyx_store::{LocalStore, StorePatch};
use serde_json::{json, Value};

const COMMENT: &str = "reportAction_42";

struct Fixture {
    store: LocalStore,
    transport: Arc<ScriptedTransport>,
    dispatcher: MutationDispatcher,
    timer: ManualTimer,
    drafts: DraftManager,
}

fn fixture() -> Fixture {
    let store = LocalStore::in_memory();
    store
        .set(COMMENT, json!({"reportActionID": 42, "message": "Hi"}))
        .unwrap();

    let transport = Arc::new(ScriptedTransport::default());
    let dispatcher = MutationDispatcher::start(
        store.clone(),
        transport.clone(),
        DispatchConfig {
            retry: RetryPolicy::no_retry(),
        },
    );
    let timer = ManualTimer::new();
    let drafts = DraftManager::new(
        store.clone(),
        dispatcher.clone(),
        Arc::new(timer.clone()),
        DraftConfig::default(),
    );

    Fixture {
        store,
        transport,
        dispatcher,
        timer,
        drafts,
    }
}

/// Record every value written under `key`, skipping the initial delivery.
fn record_writes(store: &LocalStore, key: &str) -> Arc<Mutex<Vec<Option<Value>>>> {
    let writes = Arc::new(Mutex::new(Vec::new()));
    let sink = writes.clone();
    let seen_initial = Mutex::new(false);
    store
        .subscribe(key, move |value| {
            let mut seen = seen_initial.lock().unwrap();
            if *seen {
                sink.lock().unwrap().push(value.cloned());
            }
            *seen = true;
        })
        .unwrap();
    writes
}

fn update_comment(draft: &onyx_draft::Draft) -> Mutation {
    let text = draft.content.as_text().unwrap_or_default().to_string();
    Mutation::builder("UpdateComment")
        .param("reportActionID", 42)
        .param("text", text.clone())
        .optimistic(StorePatch::merge(
            COMMENT,
            json!({"message": text, "pendingAction": "update"}),
        ))
        .on_failure(StorePatch::merge(COMMENT, json!({"message": "Hi"})))
        .build()
}

// ──────────────────────────────────────────────
// Debounced persistence
// ──────────────────────────────────────────────

#[tokio::test]
async fn rapid_edits_persist_once_with_latest_content() {
    let f = fixture();
    let writes = record_writes(&f.store, &draft_key(COMMENT));

    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Hel").unwrap();
    f.timer.advance(Duration::from_millis(400));
    f.drafts.update_draft(COMMENT, "Hello").unwrap();

    f.timer.advance(Duration::from_millis(999));
    assert!(writes.lock().unwrap().is_empty());

    f.timer.advance(Duration::from_millis(1));
    let writes = writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let persisted = writes[0].as_ref().unwrap();
    assert_eq!(persisted["content"], json!("Hello"));
    assert_eq!(persisted["original"], json!("Hi"));
}

#[tokio::test]
async fn draft_never_touches_permanent_entity_before_commit() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Hello").unwrap();
    f.timer.advance(Duration::from_secs(5));

    assert_eq!(f.store.get(COMMENT).unwrap()["message"], json!("Hi"));
}

// ──────────────────────────────────────────────
// Commit
// ──────────────────────────────────────────────

#[tokio::test]
async fn blank_commit_asks_for_delete_confirmation() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hello");
    f.drafts.update_draft(COMMENT, "").unwrap();

    let mut built = false;
    let outcome = f
        .drafts
        .commit_draft(COMMENT, |draft| {
            built = true;
            update_comment(draft)
        })
        .unwrap();

    assert!(matches!(outcome, CommitOutcome::ConfirmDelete));
    assert!(!built);
    assert_eq!(f.drafts.state(COMMENT), DraftState::Editing);
    assert_eq!(f.dispatcher.pending_count(), 0);
    assert!(f.transport.sent().is_empty());
}

#[tokio::test]
async fn commit_dispatches_mutation_and_clears_draft() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Hello there").unwrap();

    let handle = match f.drafts.commit_draft(COMMENT, update_comment).unwrap() {
        CommitOutcome::Committed(handle) => handle,
        other => panic!("expected a committed draft, got {other:?}"),
    };

    assert_eq!(f.drafts.state(COMMENT), DraftState::Empty);
    assert!(f.drafts.get(COMMENT).is_none());
    assert_eq!(f.store.get(&draft_key(COMMENT)), None);
    // Optimistic data is visible before the server answers.
    assert_eq!(f.store.get(COMMENT).unwrap()["message"], json!("Hello there"));

    assert!(handle.settled().await.is_success());
    let sent = f.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "UpdateComment");
}

#[tokio::test]
async fn unchanged_commit_discards_without_mutation() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Hi").unwrap();

    let outcome = f.drafts.commit_draft(COMMENT, update_comment).unwrap();

    assert!(matches!(outcome, CommitOutcome::Unchanged));
    assert_eq!(f.drafts.state(COMMENT), DraftState::Empty);
    assert_eq!(f.dispatcher.pending_count(), 0);
}

#[tokio::test]
async fn invalid_mutation_keeps_draft_editing() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Hello").unwrap();

    let result = f
        .drafts
        .commit_draft(COMMENT, |_| Mutation::builder("not a command").build());

    assert!(result.is_err());
    assert_eq!(f.drafts.state(COMMENT), DraftState::Editing);
    assert_eq!(
        f.drafts.get(COMMENT).unwrap().content,
        DraftContent::from("Hello")
    );
}

#[tokio::test]
async fn pending_write_never_lands_after_commit() {
    let f = fixture();
    let writes = record_writes(&f.store, &draft_key(COMMENT));

    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Hello").unwrap();
    let handle = match f.drafts.commit_draft(COMMENT, update_comment).unwrap() {
        CommitOutcome::Committed(handle) => handle,
        other => panic!("expected a committed draft, got {other:?}"),
    };
    let writes_at_commit = writes.lock().unwrap().len();

    f.timer.advance(Duration::from_secs(10));

    assert_eq!(writes.lock().unwrap().len(), writes_at_commit);
    assert_eq!(f.store.get(&draft_key(COMMENT)), None);
    assert!(matches!(handle.settled().await, Outcome::Success(_)));
}

// ──────────────────────────────────────────────
// Discard
// ──────────────────────────────────────────────

#[tokio::test]
async fn discard_drops_draft_and_leaves_entity_alone() {
    let f = fixture();
    let before = f.store.get(COMMENT);

    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Something else").unwrap();
    f.timer.advance(Duration::from_secs(1));
    assert!(f.store.get(&draft_key(COMMENT)).is_some());

    f.drafts.discard_draft(COMMENT).unwrap();

    assert!(f.drafts.get(COMMENT).is_none());
    assert_eq!(f.store.get(&draft_key(COMMENT)), None);
    assert_eq!(f.store.get(COMMENT), before);
    assert!(f.transport.sent().is_empty());
}

#[tokio::test]
async fn pending_write_never_lands_after_discard() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "typing").unwrap();
    f.drafts.discard_draft(COMMENT).unwrap();

    f.timer.advance(Duration::from_secs(10));

    assert_eq!(f.store.get(&draft_key(COMMENT)), None);
    assert_eq!(f.timer.pending(), 0);
}

// ──────────────────────────────────────────────
// Restore and focus
// ──────────────────────────────────────────────

#[tokio::test]
async fn persisted_draft_restores_in_a_new_manager() {
    let f = fixture();
    f.drafts.create_draft(COMMENT, "Hi");
    f.drafts.update_draft(COMMENT, "Half a thought").unwrap();
    f.timer.advance(Duration::from_secs(1));

    let reopened = DraftManager::new(
        f.store.clone(),
        f.dispatcher.clone(),
        Arc::new(ManualTimer::new()),
        DraftConfig::default(),
    );
    let draft = reopened.restore(COMMENT).expect("persisted draft");

    assert_eq!(draft.content, DraftContent::from("Half a thought"));
    assert_eq!(reopened.state(COMMENT), DraftState::Editing);

    // Committing the original text is a no-op even after a restore.
    reopened.update_draft(COMMENT, "Hi").unwrap();
    assert!(matches!(
        reopened.commit_draft(COMMENT, update_comment).unwrap(),
        CommitOutcome::Unchanged
    ));
}

#[tokio::test]
async fn restore_without_persisted_draft_is_none() {
    let f = fixture();
    assert!(f.drafts.restore(COMMENT).is_none());
    assert_eq!(f.drafts.state(COMMENT), DraftState::Empty);
}

#[tokio::test]
async fn focus_returns_to_composer_after_last_editor_closes() {
    let f = fixture();
    assert_eq!(f.drafts.focus(), FocusTarget::Composer);
    assert!(f.drafts.composer_visible());

    f.drafts.create_draft("reportAction_1", "one");
    f.drafts.create_draft("reportAction_2", "two");
    assert_eq!(
        f.drafts.focus(),
        FocusTarget::Editor("reportAction_2".into())
    );
    assert!(!f.drafts.composer_visible());
    assert_eq!(f.drafts.editing(), ["reportAction_1", "reportAction_2"]);

    f.drafts.discard_draft("reportAction_2").unwrap();
    assert_eq!(
        f.drafts.focus(),
        FocusTarget::Editor("reportAction_1".into())
    );

    f.drafts.discard_draft("reportAction_1").unwrap();
    assert_eq!(f.drafts.focus(), FocusTarget::Composer);
    assert!(f.drafts.composer_visible());
}
