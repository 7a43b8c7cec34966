//! Taskboard: a personal Kanban board in the terminal.
//!
//! Talks to a `taskboard-store` server for tasks and columns and for AI
//! due-date suggestions. Configuration via CLI flags, environment variables,
//! or config file (`~/.config/taskboard/config.toml`).
//!
//! ```bash
//! # Show the board
//! cargo run --bin taskboard -- --user alice board
//!
//! # Add a task, letting the suggestion service pick due date and priority
//! cargo run --bin taskboard -- --user alice add "Write report" --suggest
//!
//! # Drop task <id> onto the "done" column
//! TASKBOARD_USER=alice cargo run --bin taskboard -- move <id> done
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::board::{BoardAction, BoardState, DropKind, PriorityFilter};
use taskboard::config::{CliArgs, ClientConfig};
use taskboard::controller::{BoardController, BoardError, BoardEvent};
use taskboard::forms::{ColumnDraft, TaskDraft};
use taskboard::notify::{Level, Notification};
use taskboard::render;
use taskboard::store::RemoteStore;
use taskboard::suggest::{self, HttpSuggester};
use taskboard_proto::ids::{ColumnId, TaskId};
use taskboard_proto::task::Priority;

/// How often `watch` checks that the store connection is still up.
const WATCH_POLL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(version, about = "Personal Kanban board")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a suggested due date and priority without creating anything.
    Suggest {
        /// Task title.
        title: String,
        /// Optional description.
        #[arg(short, long, default_value = "")]
        description: String,
    },
    #[command(flatten)]
    Store(BoardCommand),
}

/// Commands that read or write the store.
#[derive(Subcommand, Debug)]
enum BoardCommand {
    /// Print the board once.
    Board(ViewArgs),
    /// Print the board and reprint it on every change.
    Watch(ViewArgs),
    /// Create a task in the To Do column.
    Add {
        /// Task title.
        title: String,
        /// Optional description.
        #[arg(short, long, default_value = "")]
        description: String,
        /// Due date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Priority (low, medium, high).
        #[arg(short, long)]
        priority: Option<Priority>,
        /// Ask the suggestion service for due date and priority first.
        #[arg(long)]
        suggest: bool,
    },
    /// Create a column after the existing ones.
    AddColumn {
        /// Column title.
        title: String,
    },
    /// Drop a task onto a column or onto another task.
    Move {
        /// Task being dragged.
        task: String,
        /// Column id or task id it is released over.
        over: String,
    },
    /// Delete a task.
    Delete {
        /// Task to delete.
        task: String,
    },
    /// Delete a user column and every task in it.
    DeleteColumn {
        /// Column to delete.
        column: String,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ViewArgs {
    /// Only show tasks whose title or description contains this text.
    #[arg(long, default_value = "")]
    search: String,
    /// Only show tasks with this priority (all, low, medium, high).
    #[arg(long, default_value = "all")]
    priority: PriorityFilter,
    /// Collapse these columns.
    #[arg(long = "collapse")]
    collapsed: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli.args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file so stdout only carries the board.
    let _log_guard = init_logging(&cli.args.log_level, cli.args.log_file.as_deref());

    tracing::info!("taskboard starting");
    let command = cli.command.unwrap_or(Command::Store(BoardCommand::Board(ViewArgs::default())));
    let ok = match command {
        // Suggestions do not touch the store.
        Command::Suggest { title, description } => run_suggest(&config, &title, &description).await,
        Command::Store(command) => run(command, &config).await,
    };
    tracing::info!("taskboard exiting");

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn print_notifications(notifications: Vec<Notification>) {
    for n in notifications {
        if n.level == Level::Success {
            println!("{n}");
        } else {
            eprintln!("{n}");
        }
    }
}

/// Runs one board command. Returns `false` if it failed.
async fn run(command: BoardCommand, config: &ClientConfig) -> bool {
    let identity = config.identity();

    let Some(user) = identity.user().cloned() else {
        if let BoardCommand::Board(view) = &command {
            // Signed out: the board is empty and read-only.
            let mut state = BoardState::new(config.sort_order);
            apply_view(&mut state, view);
            print!("{}", render::render_board(&state));
        }
        print_notifications(vec![BoardError::NotSignedIn.notification()]);
        return matches!(command, BoardCommand::Board(_));
    };

    let store = match RemoteStore::connect(&config.store_config(), &user).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(err = %e, "failed to connect to store");
            print_notifications(vec![BoardError::Store(e).notification()]);
            return false;
        }
    };

    let mut controller = BoardController::new(Arc::new(store), identity, config.sort_order);
    let feed = match controller.sync().await {
        Ok(feed) => feed,
        Err(_) => {
            print_notifications(controller.take_notifications());
            return false;
        }
    };

    let ok = match command {
        BoardCommand::Board(view) => {
            apply_view_to(&mut controller, &view);
            print!("{}", render::render_board(controller.state()));
            true
        }
        BoardCommand::Watch(view) => {
            apply_view_to(&mut controller, &view);
            print!("{}", render::render_board(controller.state()));
            while !feed.is_closed() {
                let Ok(Some(event)) =
                    tokio::time::timeout(WATCH_POLL, controller.next_event()).await
                else {
                    continue;
                };
                if controller.handle_event(event) {
                    println!();
                    print!("{}", render::render_board(controller.state()));
                }
                print_notifications(controller.take_notifications());
            }
            eprintln!("{}", Notification::error("Lost connection to the store", None));
            false
        }
        BoardCommand::Add {
            title,
            description,
            due,
            priority,
            suggest,
        } => {
            let mut draft = TaskDraft {
                title,
                description,
                due_date: due,
                priority: priority.unwrap_or(Priority::Low),
            };
            // A failed suggestion is reported but the task is still created.
            if suggest {
                match HttpSuggester::new(&config.suggest_url, config.suggest_timeout()) {
                    Ok(suggester) => {
                        let _ = controller.suggest(&suggester, &mut draft, today()).await;
                    }
                    Err(e) => tracing::warn!(err = %e, "suggestion client unavailable"),
                }
            }
            controller.create_task(&draft).await.is_ok()
        }
        BoardCommand::AddColumn { title } => controller
            .create_column(&ColumnDraft { title })
            .await
            .is_ok(),
        BoardCommand::Move { task, over } => run_move(&mut controller, &task, &over).await,
        BoardCommand::Delete { task } => controller.delete_task(&TaskId::new(task)).await.is_ok(),
        BoardCommand::DeleteColumn { column } => {
            match controller.delete_column(&ColumnId::new(column)).await {
                Ok(removed) => {
                    tracing::debug!(removed, "column delete finished");
                    true
                }
                Err(_) => false,
            }
        }
    };

    drop(feed);
    print_notifications(controller.take_notifications());
    ok
}

async fn run_move(controller: &mut BoardController<RemoteStore>, task: &str, over: &str) -> bool {
    let kind = match controller.drag_end(&TaskId::new(task), Some(over)) {
        Ok(kind) => kind,
        Err(_) => return false,
    };
    match kind {
        DropKind::MovedToColumn | DropKind::MovedAcrossColumns => {}
        DropKind::Reordered => {
            println!("Reordered locally; order within a column is not saved.");
            return true;
        }
        DropKind::StaleTarget => {
            eprintln!("Nothing named {over} on the board; move ignored.");
            return false;
        }
        DropKind::NoTarget | DropKind::SelfDrop | DropKind::Unchanged => {
            println!("Nothing to move.");
            return true;
        }
    }

    // Wait for the background write to report back.
    while let Some(event) = controller.next_event().await {
        match event {
            BoardEvent::WriteSucceeded(write) => {
                println!("Moved {} to {}.", write.task_id, write.column_id);
                return true;
            }
            failed @ BoardEvent::WriteFailed { .. } => {
                controller.handle_event(failed);
                return false;
            }
            other => {
                controller.handle_event(other);
            }
        }
    }
    false
}

async fn run_suggest(config: &ClientConfig, title: &str, description: &str) -> bool {
    let suggester = match HttpSuggester::new(&config.suggest_url, config.suggest_timeout()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", Notification::error("Failed to get suggestion", Some(e.to_string())));
            return false;
        }
    };
    match suggest::request_suggestion(&suggester, title, description, today()).await {
        Ok(suggestion) => {
            println!("due {} priority {}", suggestion.due_date, suggestion.priority);
            true
        }
        Err(e) => {
            tracing::warn!(err = %e, "suggestion failed");
            eprintln!("{}", Notification::error("Failed to get suggestion", Some(e.to_string())));
            false
        }
    }
}

fn apply_view(state: &mut BoardState, view: &ViewArgs) {
    for action in view_actions(view) {
        state.apply(action);
    }
}

fn apply_view_to(controller: &mut BoardController<RemoteStore>, view: &ViewArgs) {
    for action in view_actions(view) {
        controller.apply(action);
    }
}

fn view_actions(view: &ViewArgs) -> Vec<BoardAction> {
    let mut actions = vec![
        BoardAction::SetSearch(view.search.clone()),
        BoardAction::SetPriorityFilter(view.priority),
    ];
    actions.extend(
        view.collapsed
            .iter()
            .map(|c| BoardAction::ToggleCollapsed(ColumnId::new(c.as_str()))),
    );
    actions
}
