//! WebSocket client for the Taskboard store server.
//!
//! One connection per board, authenticated with the signed-in user id.
//! Subscriptions and writes are multiplexed over it by client-chosen ids:
//! a background reader task routes snapshots to their subscription channels
//! and write answers to the waiting request. A writer task owns the sink so
//! that dropping a [`Subscription`] can queue its `Unsubscribe` without
//! blocking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use taskboard_proto::column::{Column, NewColumn};
use taskboard_proto::ids::{ColumnId, TaskId, UserId};
use taskboard_proto::sync::{
    self, ClientMessage, Query, ServerMessage, SortOrder, WriteError, WriteOp, WriteOutcome,
};
use taskboard_proto::task::{NewTask, Task};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{BoardStore, StoreError, Subscription};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSender = futures_util::stream::SplitSink<WsStream, Message>;
type WsReader = futures_util::stream::SplitStream<WsStream>;

/// Default timeout for connecting and authenticating.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a write to be answered.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type WriteReply = Result<WriteOutcome, WriteError>;

enum SnapshotSink {
    Tasks(mpsc::UnboundedSender<Vec<Task>>),
    Columns(mpsc::UnboundedSender<Vec<Column>>),
}

/// State shared between the store handle and its background tasks.
#[derive(Default)]
struct Shared {
    next_id: AtomicU64,
    connected: AtomicBool,
    pending: Mutex<HashMap<u64, oneshot::Sender<WriteReply>>>,
    subscriptions: Mutex<HashMap<u64, SnapshotSink>>,
}

impl Shared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Connection settings for [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// `ws://` or `wss://` URL of the store's `/ws` endpoint.
    pub url: String,
    /// Timeout for connecting and authenticating.
    pub connect_timeout: Duration,
    /// Timeout for a write to be answered.
    pub write_timeout: Duration,
}

impl RemoteStoreConfig {
    /// Settings with default timeouts.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// [`BoardStore`] backed by a `taskboard-store` server.
pub struct RemoteStore {
    user: UserId,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    shared: Arc<Shared>,
    write_timeout: Duration,
    reader_handle: tokio::task::JoinHandle<()>,
    writer_handle: tokio::task::JoinHandle<()>,
}

impl RemoteStore {
    /// Connects to the store and authenticates as `user`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if connecting or authenticating times out.
    /// - [`StoreError::Io`] if the server cannot be reached.
    /// - [`StoreError::Protocol`] if the URL is not a `ws://` or `wss://`
    ///   URL, or authentication is rejected.
    /// - [`StoreError::ConnectionClosed`] if the server hangs up first.
    pub async fn connect(config: &RemoteStoreConfig, user: &UserId) -> Result<Self, StoreError> {
        validate_store_url(&config.url)?;
        let url = config.url.as_str();
        let (ws_stream, _response) =
            tokio::time::timeout(config.connect_timeout, connect_async(url))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "store WebSocket connect timed out");
                    StoreError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, err = %e, "store WebSocket connect failed");
                    map_ws_connect_error(e)
                })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let auth = ClientMessage::Authenticate {
            user_id: user.to_string(),
        };
        send_client_msg(&mut ws_sender, &auth).await?;

        let ack = tokio::time::timeout(config.connect_timeout, ws_reader.next())
            .await
            .map_err(|_| {
                tracing::warn!(url, "store authentication timed out");
                StoreError::Timeout
            })?;
        match ack {
            Some(Ok(Message::Binary(data))) => match sync::decode_server(&data) {
                Ok(ServerMessage::Authenticated { user_id }) => {
                    tracing::info!(user = %user_id, url, "authenticated with store");
                }
                Ok(ServerMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "store authentication rejected");
                    return Err(StoreError::Protocol(format!(
                        "authentication rejected: {reason}"
                    )));
                }
                Ok(other) => {
                    tracing::warn!(?other, "unexpected store response during authentication");
                    return Err(StoreError::Protocol(
                        "unexpected response during authentication".to_string(),
                    ));
                }
                Err(e) => return Err(StoreError::Protocol(e.to_string())),
            },
            Some(Ok(Message::Close(_))) | None => return Err(StoreError::ConnectionClosed),
            Some(Ok(_)) => {
                return Err(StoreError::Protocol(
                    "unexpected non-binary frame during authentication".to_string(),
                ));
            }
            Some(Err(e)) => return Err(StoreError::Io(std::io::Error::other(e.to_string()))),
        }

        let shared = Arc::new(Shared::default());
        shared.connected.store(true, Ordering::Relaxed);

        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let writer_handle = tokio::spawn(writer_loop(ws_sender, outgoing_rx, Arc::clone(&shared)));
        let reader_handle = tokio::spawn(reader_loop(ws_reader, Arc::clone(&shared)));

        Ok(Self {
            user: user.clone(),
            outgoing,
            shared,
            write_timeout: config.write_timeout,
            reader_handle,
            writer_handle,
        })
    }

    /// The authenticated user.
    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    /// Returns `true` while the connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    async fn write(&self, op: WriteOp) -> Result<WriteOutcome, StoreError> {
        if !self.is_connected() {
            return Err(StoreError::ConnectionClosed);
        }
        let request_id = self.shared.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(request_id, tx);

        if self
            .outgoing
            .send(ClientMessage::Write { request_id, op })
            .is_err()
        {
            self.shared.pending.lock().remove(&request_id);
            return Err(StoreError::ConnectionClosed);
        }

        match tokio::time::timeout(self.write_timeout, rx).await {
            Err(_) => {
                self.shared.pending.lock().remove(&request_id);
                tracing::warn!(request_id, "store write timed out");
                Err(StoreError::Timeout)
            }
            Ok(Err(_)) => Err(StoreError::ConnectionClosed),
            Ok(Ok(reply)) => reply.map_err(StoreError::Rejected),
        }
    }

    fn subscribe<T: Send + 'static>(
        &self,
        query: Query,
        sink: impl FnOnce(mpsc::UnboundedSender<T>) -> SnapshotSink,
    ) -> Result<Subscription<T>, StoreError> {
        if !self.is_connected() {
            return Err(StoreError::ConnectionClosed);
        }
        let subscription_id = self.shared.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscriptions
            .lock()
            .insert(subscription_id, sink(tx));

        if self
            .outgoing
            .send(ClientMessage::Subscribe {
                subscription_id,
                query,
            })
            .is_err()
        {
            self.shared.subscriptions.lock().remove(&subscription_id);
            return Err(StoreError::ConnectionClosed);
        }
        tracing::debug!(subscription_id, ?query, "subscribed");

        let shared = Arc::clone(&self.shared);
        let outgoing = self.outgoing.clone();
        Ok(Subscription::new(rx, move || {
            shared.subscriptions.lock().remove(&subscription_id);
            let _ = outgoing.send(ClientMessage::Unsubscribe { subscription_id });
        }))
    }
}

impl Drop for RemoteStore {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
        self.shared.connected.store(false, Ordering::Relaxed);
        self.shared.pending.lock().clear();
        self.shared.subscriptions.lock().clear();
    }
}

fn unexpected(outcome: &WriteOutcome) -> StoreError {
    StoreError::Protocol(format!("unexpected write outcome: {outcome:?}"))
}

impl BoardStore for RemoteStore {
    async fn subscribe_tasks(
        &self,
        order: SortOrder,
    ) -> Result<Subscription<Vec<Task>>, StoreError> {
        self.subscribe(Query::Tasks { order }, SnapshotSink::Tasks)
    }

    async fn subscribe_columns(&self) -> Result<Subscription<Vec<Column>>, StoreError> {
        self.subscribe(Query::Columns, SnapshotSink::Columns)
    }

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        match self.write(WriteOp::CreateTask(new)).await? {
            WriteOutcome::TaskCreated(task) => Ok(task),
            other => Err(unexpected(&other)),
        }
    }

    async fn create_column(&self, new: NewColumn) -> Result<Column, StoreError> {
        match self.write(WriteOp::CreateColumn(new)).await? {
            WriteOutcome::ColumnCreated(column) => Ok(column),
            other => Err(unexpected(&other)),
        }
    }

    async fn update_task_column(
        &self,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> Result<(), StoreError> {
        let op = WriteOp::UpdateTaskColumn {
            task_id: task_id.clone(),
            column_id: column_id.clone(),
        };
        match self.write(op).await? {
            WriteOutcome::Updated => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn delete_task(&self, task_id: &TaskId) -> Result<(), StoreError> {
        let op = WriteOp::DeleteTask {
            task_id: task_id.clone(),
        };
        match self.write(op).await? {
            WriteOutcome::Deleted { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn delete_column(&self, column_id: &ColumnId) -> Result<u32, StoreError> {
        let op = WriteOp::DeleteColumn {
            column_id: column_id.clone(),
        };
        match self.write(op).await? {
            WriteOutcome::Deleted { tasks_removed } => Ok(tasks_removed),
            other => Err(unexpected(&other)),
        }
    }
}

/// Background task that encodes queued client messages onto the socket.
async fn writer_loop(
    mut ws_sender: WsSender,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    shared: Arc<Shared>,
) {
    while let Some(msg) = outgoing.recv().await {
        if let Err(e) = send_client_msg(&mut ws_sender, &msg).await {
            tracing::warn!(err = %e, "store send failed");
            break;
        }
    }
    shared.connected.store(false, Ordering::Relaxed);
    let _ = ws_sender.close().await;
}

/// Background task that routes server frames to subscriptions and writes.
///
/// Malformed frames are logged and skipped. When the socket closes every
/// pending write fails with [`StoreError::ConnectionClosed`] and every
/// subscription ends.
async fn reader_loop(mut ws_reader: WsReader, shared: Arc<Shared>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match sync::decode_server(&data) {
                Ok(msg) => dispatch(&shared, msg),
                Err(e) => tracing::warn!(err = %e, "malformed store frame, skipping"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("store WebSocket closed by server");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "store WebSocket read error");
                break;
            }
        }
    }
    shared.connected.store(false, Ordering::Relaxed);
    shared.pending.lock().clear();
    shared.subscriptions.lock().clear();
    tracing::info!("store reader task exiting");
}

fn dispatch(shared: &Shared, msg: ServerMessage) {
    match msg {
        ServerMessage::TaskSnapshot {
            subscription_id,
            tasks,
        } => {
            let mut subs = shared.subscriptions.lock();
            if let Some(SnapshotSink::Tasks(tx)) = subs.get(&subscription_id)
                && tx.send(tasks).is_err()
            {
                subs.remove(&subscription_id);
            }
        }
        ServerMessage::ColumnSnapshot {
            subscription_id,
            columns,
        } => {
            let mut subs = shared.subscriptions.lock();
            if let Some(SnapshotSink::Columns(tx)) = subs.get(&subscription_id)
                && tx.send(columns).is_err()
            {
                subs.remove(&subscription_id);
            }
        }
        ServerMessage::WriteAccepted {
            request_id,
            outcome,
        } => complete(shared, request_id, Ok(outcome)),
        ServerMessage::WriteRejected { request_id, error } => {
            complete(shared, request_id, Err(error));
        }
        ServerMessage::Error { reason } => {
            tracing::warn!(reason = %reason, "store server error");
        }
        ServerMessage::Authenticated { .. } => {
            tracing::debug!("ignoring repeated Authenticated");
        }
    }
}

fn complete(shared: &Shared, request_id: u64, reply: WriteReply) {
    let waiter = shared.pending.lock().remove(&request_id);
    match waiter {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => tracing::debug!(request_id, "answer for unknown or expired write"),
    }
}

async fn send_client_msg(ws_sender: &mut WsSender, msg: &ClientMessage) -> Result<(), StoreError> {
    let bytes = sync::encode_client(msg).map_err(|e| StoreError::Protocol(e.to_string()))?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(format!("WebSocket send error: {e}"))))
}

fn validate_store_url(raw: &str) -> Result<(), StoreError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| StoreError::Protocol(format!("invalid store URL {raw:?}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(StoreError::Protocol(format!(
            "store URL must use ws or wss, not {other}"
        ))),
    }
}

/// Map a `tokio_tungstenite` connection error to a [`StoreError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> StoreError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => StoreError::Io(io_err),
        WsError::Http(response) => StoreError::Io(std::io::Error::other(format!(
            "store HTTP error: status {}",
            response.status()
        ))),
        other => StoreError::Io(std::io::Error::other(format!(
            "store connection error: {other}"
        ))),
    }
}
