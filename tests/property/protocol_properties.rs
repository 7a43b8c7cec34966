//! Property-based tests for the Taskboard data model and wire protocol.
//!
//! Uses proptest to verify:
//! 1. A suggestion is accepted exactly when its due date falls in
//!    `(today, today + 30 days]`.
//! 2. Random text never panics the suggestion parser.
//! 3. Random bytes never panic the store protocol decoders.
//! 4. Arbitrary stored task documents either validate into a task with a
//!    trimmed, non-empty title or are rejected; they never panic.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use taskboard_proto::document::TaskDocument;
use taskboard_proto::suggest::{SUGGESTION_WINDOW_DAYS, SuggestError, Suggestion};
use taskboard_proto::sync;
use taskboard_proto::task::{Priority, Task};

/// Strategy for dates between 2000-01-01 and roughly 2100.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..36_500).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(offset)))
            .expect("date in range")
    })
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
    ]
}

proptest! {
    /// The suggestion window is exclusive of today and inclusive of day 30.
    #[test]
    fn suggestion_window(today in arb_date(), offset in -60i64..90, priority in arb_priority()) {
        let due_date = if offset >= 0 {
            today.checked_add_days(Days::new(offset.unsigned_abs())).expect("date in range")
        } else {
            today.checked_sub_days(Days::new(offset.unsigned_abs())).expect("date in range")
        };
        let expected_ok = offset > 0 && offset.unsigned_abs() <= SUGGESTION_WINDOW_DAYS;

        let suggestion = Suggestion { due_date, priority };
        prop_assert_eq!(suggestion.validate(today).is_ok(), expected_ok);

        let text = format!(
            r#"{{"dueDate":"{}","priority":"{}"}}"#,
            due_date.format("%Y-%m-%d"),
            priority
        );
        match Suggestion::parse(&text, today) {
            Ok(parsed) => {
                prop_assert!(expected_ok);
                prop_assert_eq!(parsed, suggestion);
            }
            Err(SuggestError::OutOfRange { .. }) => prop_assert!(!expected_ok),
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    /// Random text never causes a panic in the suggestion parser.
    #[test]
    fn random_suggestion_text_no_panic(text in ".{0,256}", today in arb_date()) {
        let _ = Suggestion::parse(&text, today);
    }

    /// Random bytes never cause a panic when decoded as a client message.
    #[test]
    fn random_bytes_decode_client_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = sync::decode_client(&bytes);
    }

    /// Random bytes never cause a panic when decoded as a server message.
    #[test]
    fn random_bytes_decode_server_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = sync::decode_server(&bytes);
    }

    /// Stored documents are either valid tasks or rejected, never cast.
    #[test]
    fn task_documents_validate_or_reject(
        id in proptest::option::of("[a-z0-9]{0,8}"),
        title in proptest::option::of(".{0,300}"),
        due_date in proptest::option::of("[0-9-]{0,12}"),
        priority in proptest::option::of("(low|medium|high|urgent|)"),
        status in proptest::option::of("(todo|inprogress|done|)"),
        owner_id in proptest::option::of("[a-z]{0,6}"),
        created_at in proptest::option::of(any::<u64>()),
    ) {
        let doc = TaskDocument {
            id,
            title,
            description: None,
            due_date,
            priority,
            status,
            owner_id,
            created_at,
        };
        if let Ok(task) = Task::try_from(doc) {
            prop_assert!(!task.title.is_empty());
            prop_assert_eq!(task.title.trim(), task.title.as_str());
            prop_assert!(!task.id.is_empty());
            prop_assert!(!task.column_id.is_empty());
        }
    }
}

#[test]
fn suggestion_scenario_from_request_date() {
    let today = NaiveDate::from_ymd_opt(2025, 4, 29).expect("valid date");
    let accepted = Suggestion::parse(r#"{"dueDate":"2025-05-14","priority":"medium"}"#, today)
        .expect("14 days ahead is inside the window");
    assert_eq!(accepted.priority, Priority::Medium);

    let rejected = Suggestion::parse(r#"{"dueDate":"2025-04-29","priority":"medium"}"#, today);
    assert!(matches!(rejected, Err(SuggestError::OutOfRange { .. })));
}
