//! End-to-end board tests against an in-process store server.
//!
//! Each test starts `taskboard-store` on `127.0.0.1:0`, connects board
//! controllers through `RemoteStore`, and drives them the way the CLI does.

use std::sync::Arc;
use std::time::Duration;

use taskboard::board::DropKind;
use taskboard::controller::{BoardController, BoardEvent};
use taskboard::forms::{ColumnDraft, TaskDraft};
use taskboard::identity::Identity;
use taskboard::notify::Level;
use taskboard::store::remote::RemoteStoreConfig;
use taskboard::store::{BoardStore, RemoteStore};
use taskboard_proto::ids::{ColumnId, TaskId, UserId};
use taskboard_proto::suggest::SuggestError;
use taskboard_proto::sync::SortOrder;
use taskboard_store::suggest::CompletionClient;

struct NoCompletion;

impl CompletionClient for NoCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, SuggestError> {
        Err(SuggestError::Service("offline".to_string()))
    }
}

async fn start_store() -> String {
    let (addr, _handle) = taskboard_store::server::start_server("127.0.0.1:0", NoCompletion)
        .await
        .expect("store server starts");
    format!("ws://{addr}/ws")
}

async fn connect(url: &str, user: &str) -> RemoteStore {
    RemoteStore::connect(&RemoteStoreConfig::new(url), &UserId::from(user))
        .await
        .expect("connect to store")
}

async fn board(url: &str, user: &str) -> BoardController<RemoteStore> {
    BoardController::new(
        Arc::new(connect(url, user).await),
        Identity::signed_in_as(user),
        SortOrder::Ascending,
    )
}

/// Applies events until `done` holds for the board or five seconds pass.
async fn pump_until(
    controller: &mut BoardController<RemoteStore>,
    mut done: impl FnMut(&BoardController<RemoteStore>) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done(&*controller) {
        let event = tokio::time::timeout_at(deadline, controller.next_event())
            .await
            .expect("condition reached before timeout")
            .expect("event channel open");
        controller.handle_event(event);
    }
}

/// Applies events until a column write reports back and returns it.
async fn next_write_result(controller: &mut BoardController<RemoteStore>) -> BoardEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), controller.next_event())
            .await
            .expect("write result before timeout")
            .expect("event channel open");
        if matches!(
            event,
            BoardEvent::WriteSucceeded(_) | BoardEvent::WriteFailed { .. }
        ) {
            return event;
        }
        controller.handle_event(event);
    }
}

fn column_of(controller: &BoardController<RemoteStore>, id: &TaskId) -> String {
    controller
        .state()
        .tasks()
        .iter()
        .find(|t| &t.id == id)
        .map(|t| t.column_id.to_string())
        .expect("task on board")
}

#[tokio::test]
async fn drop_on_done_column_is_written_and_pushed_back() {
    let url = start_store().await;
    let mut alice = board(&url, "alice").await;
    let _feed = alice.sync().await.unwrap();

    let t1 = alice.create_task(&TaskDraft::titled("one")).await.unwrap();
    let t2 = alice.create_task(&TaskDraft::titled("two")).await.unwrap();
    let t3 = alice.create_task(&TaskDraft::titled("three")).await.unwrap();
    pump_until(&mut alice, |b| b.state().tasks().len() == 3).await;

    // {1: todo, 2: inprogress, 3: todo}
    assert_eq!(
        alice.drag_end(&t2.id, Some("inprogress")).unwrap(),
        DropKind::MovedToColumn
    );
    assert!(matches!(
        next_write_result(&mut alice).await,
        BoardEvent::WriteSucceeded(_)
    ));

    let kind = alice.drag_end(&t1.id, Some("done")).unwrap();
    assert_eq!(kind, DropKind::MovedToColumn);
    // Optimistic: visible before the store answers.
    assert_eq!(column_of(&alice, &t1.id), "done");

    match next_write_result(&mut alice).await {
        BoardEvent::WriteSucceeded(write) => {
            assert_eq!(write.task_id, t1.id);
            assert_eq!(write.column_id.as_str(), "done");
        }
        other => panic!("expected success, got {other:?}"),
    }

    // A fresh client sees the stored result.
    let mut observer = board(&url, "alice").await;
    let _observer_feed = observer.sync().await.unwrap();
    assert_eq!(column_of(&observer, &t1.id), "done");
    assert_eq!(column_of(&observer, &t2.id), "inprogress");
    assert_eq!(column_of(&observer, &t3.id), "todo");
    let ids: Vec<&TaskId> = observer.state().tasks().iter().map(|t| &t.id).collect();
    assert_eq!(ids, vec![&t1.id, &t2.id, &t3.id]);
}

#[tokio::test]
async fn in_column_order_is_not_durable() {
    let url = start_store().await;
    let mut alice = board(&url, "alice").await;
    let _feed = alice.sync().await.unwrap();

    let first = alice.create_task(&TaskDraft::titled("first")).await.unwrap();
    let second = alice.create_task(&TaskDraft::titled("second")).await.unwrap();
    pump_until(&mut alice, |b| b.state().tasks().len() == 2).await;

    let kind = alice.drag_end(&first.id, Some(second.id.as_str())).unwrap();
    assert_eq!(kind, DropKind::Reordered);
    assert_eq!(alice.state().tasks()[0].id, second.id);

    // A reload orders by creation time again.
    let mut reloaded = board(&url, "alice").await;
    let _reloaded_feed = reloaded.sync().await.unwrap();
    assert_eq!(reloaded.state().tasks()[0].id, first.id);
}

#[tokio::test]
async fn deleting_user_column_removes_its_tasks() {
    let url = start_store().await;
    let mut alice = board(&url, "alice").await;
    let _feed = alice.sync().await.unwrap();

    let blocked = alice
        .create_column(&ColumnDraft {
            title: "Blocked".to_string(),
        })
        .await
        .unwrap();
    let a = alice.create_task(&TaskDraft::titled("a")).await.unwrap();
    let b = alice.create_task(&TaskDraft::titled("b")).await.unwrap();
    let keep = alice.create_task(&TaskDraft::titled("keep")).await.unwrap();
    pump_until(&mut alice, |c| {
        c.state().tasks().len() == 3 && c.state().has_column(&blocked.id)
    })
    .await;

    for id in [&a.id, &b.id] {
        alice.drag_end(id, Some(blocked.id.as_str())).unwrap();
        assert!(matches!(
            next_write_result(&mut alice).await,
            BoardEvent::WriteSucceeded(_)
        ));
    }

    let removed = alice.delete_column(&blocked.id).await.unwrap();
    assert_eq!(removed, 2);

    pump_until(&mut alice, |c| {
        c.state().tasks().len() == 1 && !c.state().has_column(&blocked.id)
    })
    .await;
    assert!(
        alice
            .state()
            .tasks()
            .iter()
            .all(|t| t.column_id != blocked.id)
    );
    assert_eq!(alice.state().tasks()[0].id, keep.id);
}

#[tokio::test]
async fn builtin_columns_cannot_be_deleted() {
    let url = start_store().await;
    let mut alice = board(&url, "alice").await;
    let _feed = alice.sync().await.unwrap();
    assert!(alice.delete_column(&ColumnId::from("todo")).await.is_err());

    // The store refuses it too.
    let raw = connect(&url, "alice").await;
    assert!(raw.delete_column(&ColumnId::from("todo")).await.is_err());
}

#[tokio::test]
async fn owners_do_not_see_each_other() {
    let url = start_store().await;
    let mut alice = board(&url, "alice").await;
    let mut bob = board(&url, "bob").await;
    let _alice_feed = alice.sync().await.unwrap();
    let _bob_feed = bob.sync().await.unwrap();

    alice.create_task(&TaskDraft::titled("private")).await.unwrap();
    bob.create_task(&TaskDraft::titled("bob's")).await.unwrap();
    pump_until(&mut alice, |c| c.state().tasks().len() == 1).await;
    pump_until(&mut bob, |c| c.state().tasks().len() == 1).await;

    assert_eq!(alice.state().tasks()[0].title, "private");
    assert_eq!(bob.state().tasks()[0].title, "bob's");

    // Bob cannot move Alice's task even knowing its id.
    let alice_task = alice.state().tasks()[0].id.clone();
    let raw_bob = connect(&url, "bob").await;
    assert!(
        raw_bob
            .update_task_column(&alice_task, &ColumnId::from("done"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn failed_write_is_reported_and_board_follows_store() {
    let url = start_store().await;
    let mut alice = board(&url, "alice").await;
    let _feed = alice.sync().await.unwrap();

    let column = alice
        .create_column(&ColumnDraft {
            title: "Soon gone".to_string(),
        })
        .await
        .unwrap();
    let task = alice.create_task(&TaskDraft::titled("wanderer")).await.unwrap();
    pump_until(&mut alice, |c| {
        c.state().tasks().len() == 1 && c.state().has_column(&column.id)
    })
    .await;

    // Another session deletes the column before this board hears about it.
    let other = connect(&url, "alice").await;
    other.delete_column(&column.id).await.unwrap();

    assert_eq!(
        alice.drag_end(&task.id, Some(column.id.as_str())).unwrap(),
        DropKind::MovedToColumn
    );
    let event = next_write_result(&mut alice).await;
    assert!(matches!(event, BoardEvent::WriteFailed { .. }));
    alice.handle_event(event);

    pump_until(&mut alice, |c| !c.state().has_column(&column.id)).await;
    let board_tasks = alice.state().tasks();
    assert_eq!(board_tasks.len(), 1);
    assert_eq!(board_tasks[0].column_id.as_str(), "todo");
    assert!(
        alice
            .take_notifications()
            .iter()
            .any(|n| n.level == Level::Error)
    );
}

#[tokio::test]
async fn signed_out_board_cannot_write() {
    let url = start_store().await;
    let mut anonymous = BoardController::new(
        Arc::new(connect(&url, "alice").await),
        Identity::anonymous(),
        SortOrder::Ascending,
    );
    let _feed = anonymous.sync().await.unwrap();
    assert!(anonymous.create_task(&TaskDraft::titled("nope")).await.is_err());
    let notes = anonymous.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Warning);
}
