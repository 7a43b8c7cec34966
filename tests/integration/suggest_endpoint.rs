//! Suggestion endpoint tests: HTTP contract of `POST /api/task-suggest` and
//! the board client's suggester against it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Days, NaiveDate, Utc};
use taskboard::controller::{BoardController, BoardError};
use taskboard::forms::TaskDraft;
use taskboard::identity::Identity;
use taskboard::store::RemoteStore;
use taskboard::store::remote::RemoteStoreConfig;
use taskboard::suggest::{DEFAULT_SUGGEST_TIMEOUT, HttpSuggester, Suggester};
use taskboard_proto::ids::UserId;
use taskboard_proto::suggest::{SuggestError, SuggestErrorBody, SuggestRequest};
use taskboard_proto::sync::SortOrder;
use taskboard_proto::task::Priority;
use taskboard_store::documents::DocumentStore;
use taskboard_store::server::{ServerState, start_server_with_state};
use taskboard_store::suggest::CompletionClient;

/// Completion stub that answers with a due date `offset_days` after today.
struct OffsetCompletion {
    offset_days: u64,
    priority: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CompletionClient for OffsetCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, SuggestError> {
        assert!(prompt.contains("Write report"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        let due = today()
            .checked_add_days(Days::new(self.offset_days))
            .expect("date in range");
        Ok(format!(
            r#"{{"dueDate":"{}","priority":"{}"}}"#,
            due.format("%Y-%m-%d"),
            self.priority
        ))
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

struct Harness {
    base: String,
    calls: Arc<AtomicUsize>,
}

async fn start(offset_days: u64, priority: &'static str) -> Harness {
    let calls = Arc::new(AtomicUsize::new(0));
    let completion = OffsetCompletion {
        offset_days,
        priority,
        calls: Arc::clone(&calls),
    };
    let state = Arc::new(ServerState::new(DocumentStore::new(), completion));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("store server starts");
    Harness {
        base: format!("http://{addr}"),
        calls,
    }
}

fn request(title: &str) -> SuggestRequest {
    SuggestRequest {
        title: title.to_string(),
        description: "Quarterly numbers".to_string(),
    }
}

#[tokio::test]
async fn missing_title_is_bad_request() {
    let harness = start(14, "medium").await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/task-suggest", harness.base))
        .json(&request(""))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: SuggestErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "Missing title");
    assert_eq!(harness.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn out_of_range_answer_is_server_error() {
    // Same day as the request is outside the window.
    let harness = start(0, "medium").await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/task-suggest", harness.base))
        .json(&request("Write report"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: SuggestErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "AI suggestion failed, please try again.");
}

#[tokio::test]
async fn in_range_answer_is_returned() {
    let harness = start(14, "medium").await;
    let suggester = HttpSuggester::new(
        format!("{}/api/task-suggest", harness.base),
        DEFAULT_SUGGEST_TIMEOUT,
    )
    .unwrap();
    let suggestion = suggester.suggest(&request("Write report")).await.unwrap();
    assert_eq!(suggestion.priority, Priority::Medium);
    assert_eq!(
        suggestion.due_date,
        today().checked_add_days(Days::new(14)).unwrap()
    );
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn controller_applies_suggestion_to_draft() {
    let harness = start(30, "high").await;
    let ws_url = harness.base.replacen("http://", "ws://", 1) + "/ws";
    let store = RemoteStore::connect(&RemoteStoreConfig::new(ws_url), &UserId::from("alice"))
        .await
        .unwrap();
    let mut controller = BoardController::new(
        Arc::new(store),
        Identity::signed_in_as("alice"),
        SortOrder::Ascending,
    );
    let suggester = HttpSuggester::new(
        format!("{}/api/task-suggest", harness.base),
        DEFAULT_SUGGEST_TIMEOUT,
    )
    .unwrap();

    let mut draft = TaskDraft::titled("Write report");
    controller
        .suggest(&suggester, &mut draft, today())
        .await
        .unwrap();
    assert_eq!(draft.priority, Priority::High);
    assert_eq!(draft.due_date, today().checked_add_days(Days::new(30)));

    let created = controller.create_task(&draft).await.unwrap();
    assert_eq!(created.priority, Some(Priority::High));
    assert_eq!(created.due_date, draft.due_date);
}

#[tokio::test]
async fn failed_suggestion_leaves_draft_unchanged() {
    let harness = start(31, "high").await;
    let ws_url = harness.base.replacen("http://", "ws://", 1) + "/ws";
    let store = RemoteStore::connect(&RemoteStoreConfig::new(ws_url), &UserId::from("alice"))
        .await
        .unwrap();
    let mut controller = BoardController::new(
        Arc::new(store),
        Identity::signed_in_as("alice"),
        SortOrder::Ascending,
    );
    let suggester = HttpSuggester::new(
        format!("{}/api/task-suggest", harness.base),
        DEFAULT_SUGGEST_TIMEOUT,
    )
    .unwrap();

    let mut draft = TaskDraft::titled("Write report");
    let before = draft.clone();
    let err = controller
        .suggest(&suggester, &mut draft, today())
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Suggest(SuggestError::Service(_))));
    assert_eq!(draft, before);
}
