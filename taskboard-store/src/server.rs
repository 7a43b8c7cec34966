//! Store server core: shared state, WebSocket handler, subscriptions and
//! write handling.
//!
//! Each connection authenticates with a user id and then multiplexes any
//! number of snapshot subscriptions and writes. A subscription pushes a full
//! snapshot immediately and again whenever a change touches the subscribed
//! owner and collection. Writes are applied in arrival order per connection
//! and answered by request id.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use taskboard_proto::ids::UserId;
use taskboard_proto::sync::{
    self, ClientMessage, Query, ServerMessage, WriteError, WriteOp, WriteOutcome,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::documents::DocumentStore;
use crate::suggest::{self, CompletionClient};

/// Default maximum accepted frame size in bytes (64 KB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Shared server state.
pub struct ServerState<C> {
    documents: DocumentStore,
    completion: C,
    max_frame_size: usize,
}

impl<C: CompletionClient> ServerState<C> {
    /// Creates server state with the default frame size limit.
    #[must_use]
    pub fn new(documents: DocumentStore, completion: C) -> Self {
        Self::with_config(documents, completion, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates server state with a custom frame size limit.
    #[must_use]
    pub fn with_config(documents: DocumentStore, completion: C, max_frame_size: usize) -> Self {
        Self {
            documents,
            completion,
            max_frame_size,
        }
    }

    /// The document store.
    #[must_use]
    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// The completion backend used for suggestions.
    #[must_use]
    pub const fn completion(&self) -> &C {
        &self.completion
    }
}

/// Running subscription tasks of one connection, aborted on drop.
#[derive(Default)]
struct Subscriptions(HashMap<u64, JoinHandle<()>>);

impl Subscriptions {
    fn insert(&mut self, id: u64, handle: JoinHandle<()>) {
        if let Some(old) = self.0.insert(id, handle) {
            old.abort();
        }
    }

    fn remove(&mut self, id: u64) -> bool {
        self.0.remove(&id).map(|h| h.abort()).is_some()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for handle in self.0.values() {
            handle.abort();
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Wait for an `Authenticate` message; anything else closes the socket.
/// 2. Send `Authenticated` back.
/// 3. Process subscriptions and writes until the client disconnects.
/// 4. Abort every subscription task of the connection.
pub async fn handle_socket<C: CompletionClient>(socket: WebSocket, state: Arc<ServerState<C>>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let owner = match wait_for_authenticate(&mut ws_receiver).await {
        Ok(owner) => owner,
        Err(reason) => {
            tracing::warn!(reason = %reason, "authentication failed");
            let _ = send_server_msg(&mut ws_sender, &ServerMessage::Error { reason }).await;
            let _ = ws_sender.send(Message::Close(None)).await;
            return;
        }
    };

    let ack = ServerMessage::Authenticated {
        user_id: owner.to_string(),
    };
    if let Err(e) = send_server_msg(&mut ws_sender, &ack).await {
        tracing::error!(user = %owner, error = %e, "failed to send Authenticated ack");
        return;
    }
    tracing::info!(user = %owner, "client authenticated");

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer_owner = owner.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(user = %writer_owner, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_owner = owner.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        let mut subscriptions = Subscriptions::default();
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_binary_message(
                        &reader_owner,
                        &data,
                        &reader_state,
                        &tx,
                        &mut subscriptions,
                    )
                    .await;
                }
                Message::Close(_) => {
                    tracing::info!(user = %reader_owner, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    tracing::info!(user = %owner, "client disconnected");
}

/// Waits for the first binary message, expecting `Authenticate`.
async fn wait_for_authenticate(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Result<UserId, String> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => {
                return match sync::decode_client(&data) {
                    Ok(ClientMessage::Authenticate { user_id }) if user_id.trim().is_empty() => {
                        Err("authentication requires a user id".to_string())
                    }
                    Ok(ClientMessage::Authenticate { user_id }) => Ok(UserId::new(user_id)),
                    Ok(other) => {
                        tracing::warn!(
                            msg = ?other,
                            "expected Authenticate, got different message"
                        );
                        Err("not authenticated".to_string())
                    }
                    Err(e) => Err(format!("invalid authentication message: {e}")),
                };
            }
            Message::Close(_) => break,
            _ => {
                // Skip non-binary frames during authentication.
            }
        }
    }
    Err("connection closed before authentication".to_string())
}

/// Handles one binary frame from an authenticated client.
async fn handle_binary_message<C: CompletionClient>(
    owner: &UserId,
    data: &[u8],
    state: &Arc<ServerState<C>>,
    tx: &mpsc::UnboundedSender<Message>,
    subscriptions: &mut Subscriptions,
) {
    if data.len() > state.max_frame_size {
        tracing::warn!(
            user = %owner,
            size = data.len(),
            max = state.max_frame_size,
            "frame exceeds size limit"
        );
        let err = ServerMessage::Error {
            reason: format!(
                "frame too large: {} bytes (max {})",
                data.len(),
                state.max_frame_size
            ),
        };
        send_via(tx, &err);
        return;
    }

    let msg = match sync::decode_client(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(user = %owner, error = %e, "failed to decode message");
            send_via(
                tx,
                &ServerMessage::Error {
                    reason: format!("undecodable message: {e}"),
                },
            );
            return;
        }
    };

    match msg {
        ClientMessage::Subscribe {
            subscription_id,
            query,
        } => {
            tracing::debug!(user = %owner, subscription_id, query = ?query, "subscribe");
            let handle = tokio::spawn(run_subscription(
                Arc::clone(state),
                owner.clone(),
                subscription_id,
                query,
                tx.clone(),
            ));
            subscriptions.insert(subscription_id, handle);
        }
        ClientMessage::Unsubscribe { subscription_id } => {
            let existed = subscriptions.remove(subscription_id);
            tracing::debug!(user = %owner, subscription_id, existed, "unsubscribe");
        }
        ClientMessage::Write { request_id, op } => {
            let reply = match apply_write(state.documents(), owner, op).await {
                Ok(outcome) => ServerMessage::WriteAccepted {
                    request_id,
                    outcome,
                },
                Err(error) => {
                    tracing::warn!(user = %owner, request_id, error = %error, "write rejected");
                    ServerMessage::WriteRejected { request_id, error }
                }
            };
            send_via(tx, &reply);
        }
        ClientMessage::Authenticate { user_id } => {
            tracing::warn!(
                user = %owner,
                new_id = %user_id,
                "received duplicate Authenticate from authenticated client"
            );
        }
    }
}

/// Applies a single write for `owner`.
async fn apply_write(
    documents: &DocumentStore,
    owner: &UserId,
    op: WriteOp,
) -> Result<WriteOutcome, WriteError> {
    match op {
        WriteOp::CreateTask(new) => {
            let task = documents.create_task(owner, new).await?;
            tracing::info!(user = %owner, task = %task.id, "task created");
            Ok(WriteOutcome::TaskCreated(task))
        }
        WriteOp::CreateColumn(new) => {
            let column = documents.create_column(owner, new).await?;
            tracing::info!(user = %owner, column = %column.id, "column created");
            Ok(WriteOutcome::ColumnCreated(column))
        }
        WriteOp::UpdateTaskColumn { task_id, column_id } => {
            documents
                .update_task_column(owner, &task_id, &column_id)
                .await?;
            tracing::debug!(user = %owner, task = %task_id, column = %column_id, "task moved");
            Ok(WriteOutcome::Updated)
        }
        WriteOp::DeleteTask { task_id } => {
            documents.delete_task(owner, &task_id).await?;
            tracing::info!(user = %owner, task = %task_id, "task deleted");
            Ok(WriteOutcome::Deleted { tasks_removed: 1 })
        }
        WriteOp::DeleteColumn { column_id } => {
            let tasks_removed = documents.delete_column(owner, &column_id).await?;
            tracing::info!(user = %owner, column = %column_id, tasks_removed, "column deleted");
            Ok(WriteOutcome::Deleted { tasks_removed })
        }
    }
}

/// Pushes snapshots for one subscription until the connection goes away.
async fn run_subscription<C: CompletionClient>(
    state: Arc<ServerState<C>>,
    owner: UserId,
    subscription_id: u64,
    query: Query,
    tx: mpsc::UnboundedSender<Message>,
) {
    // Listen before the first snapshot so no change falls in between.
    let mut changes = state.documents().subscribe();
    if !send_via(&tx, &snapshot(&state, &owner, subscription_id, query).await) {
        return;
    }

    loop {
        match changes.recv().await {
            Ok(change) if change.affects(&owner, &query) => {}
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    user = %owner,
                    subscription_id,
                    skipped,
                    "subscription lagged, resyncing"
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
        if !send_via(&tx, &snapshot(&state, &owner, subscription_id, query).await) {
            break;
        }
    }
}

async fn snapshot<C: CompletionClient>(
    state: &ServerState<C>,
    owner: &UserId,
    subscription_id: u64,
    query: Query,
) -> ServerMessage {
    match query {
        Query::Tasks { order } => ServerMessage::TaskSnapshot {
            subscription_id,
            tasks: state.documents().tasks(owner, order).await,
        },
        Query::Columns => ServerMessage::ColumnSnapshot {
            subscription_id,
            columns: state.documents().columns(owner).await,
        },
    }
}

/// Queues a message on a connection's writer channel. Returns `false` once
/// the connection is gone.
fn send_via(tx: &mpsc::UnboundedSender<Message>, msg: &ServerMessage) -> bool {
    match sync::encode_server(msg) {
        Ok(bytes) => tx.send(Message::Binary(bytes.into())).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode server message");
            true
        }
    }
}

/// Encodes and sends a server message directly on a WebSocket sender.
async fn send_server_msg(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &ServerMessage,
) -> Result<(), String> {
    let bytes = sync::encode_server(msg).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts a memory-only store server on the given address and returns the
/// bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server<C: CompletionClient>(
    addr: &str,
    completion: C,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let state = Arc::new(ServerState::new(DocumentStore::new(), completion));
    start_server_with_state(addr, state).await
}

/// Starts the store server with a pre-configured [`ServerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state<C: CompletionClient>(
    addr: &str,
    state: Arc<ServerState<C>>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler::<C>))
        .route(
            "/api/task-suggest",
            axum::routing::post(suggest::suggest_handler::<C>),
        )
        .route("/health", axum::routing::get(health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler<C: CompletionClient>(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ServerState<C>>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn health() -> &'static str {
    "ok"
}
