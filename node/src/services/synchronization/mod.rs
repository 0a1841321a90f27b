pub mod error;

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::client::database::DatabaseClient;
use crate::types::params::ExplorerParams;
use crate::types::sync_event::SyncEvent;
use crate::utils::ticker::Ticker;
pub use error::SyncError;

pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);
/// Status the explorer replies with once it stored an event.
pub const ACK_STATUS_CREATED: u16 = 201;

const ACCESS_KEY_HEADER: &str = "X-Explorer-AccessKey";
const SECRET_HEADER: &str = "X-Explorer-Secret";

type ExplorerStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Deserialize, Debug)]
struct Ack {
    status: u16,
}

/// Delivers stored sync events to the explorer over a websocket, oldest
/// first. An event is deleted only after the explorer acknowledged it;
/// anything else leaves it queued for the next round.
///
/// A round starts whenever a run mutation wrote an event (through the
/// shared [`Notify`]) or the ticker fires.
pub struct StatsPusher {
    database: Arc<dyn DatabaseClient>,
    params: ExplorerParams,
    notifier: Arc<Notify>,
    ack_timeout: Duration,
    cancel: CancellationToken,
    ticker: Mutex<Option<Ticker>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StatsPusher {
    pub fn new(database: Arc<dyn DatabaseClient>, params: ExplorerParams, notifier: Arc<Notify>) -> Self {
        Self {
            database,
            params,
            notifier,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            cancel: CancellationToken::new(),
            ticker: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Replaces the `push_interval` clock.
    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.ticker = Mutex::new(Some(ticker));
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub async fn start(self: &Arc<Self>) -> Result<(), SyncError> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return Err(SyncError::AlreadyStarted);
        }
        let ticker = self.ticker.lock().await.take().unwrap_or_else(|| Ticker::every(self.params.push_interval));
        let pusher = self.clone();
        *handle = Some(tokio::spawn(async move { pusher.event_loop(ticker).await }));
        info!(url = %self.params.url, "Stats pusher started");
        Ok(())
    }

    /// Stops the push loop and waits for it. Undelivered events stay stored.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Stats pusher task ended abnormally");
            }
        }
    }

    async fn event_loop(&self, mut ticker: Ticker) {
        let mut connection: Option<ExplorerStream> = None;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.notifier.notified() => {}
                _ = ticker.tick() => {}
            }

            match self.push_pending(&mut connection).await {
                Ok(0) => {}
                Ok(delivered) => debug!(delivered, "Pushed sync events"),
                Err(err) => {
                    warn!(error = %err, "Failed to push sync events, reconnecting on next round");
                    connection = None;
                }
            }
        }

        if let Some(mut stream) = connection {
            let _ = stream.close(None).await;
        }
        info!("Stats pusher stopped");
    }

    /// One delivery round. Stops at the first event the explorer does not
    /// acknowledge so events are never delivered out of order.
    async fn push_pending(&self, connection: &mut Option<ExplorerStream>) -> Result<usize, SyncError> {
        let events = self.database.sync_events().await?;
        let mut delivered = 0;
        for event in events {
            if self.cancel.is_cancelled() {
                break;
            }
            if connection.is_none() {
                *connection = Some(self.connect().await?);
            }
            let stream = connection.as_mut().ok_or(SyncError::ConnectionClosed)?;

            if !self.push(stream, &event).await? {
                break;
            }
            self.database.delete_sync_event(event.id).await?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Sends one event and waits for its acknowledgement.
    async fn push(&self, stream: &mut ExplorerStream, event: &SyncEvent) -> Result<bool, SyncError> {
        stream.send(Message::Text(event.body.clone())).await?;

        let reply = tokio::time::timeout(self.ack_timeout, next_text(stream))
            .await
            .map_err(|_| SyncError::AckTimeout(self.ack_timeout))??;

        match serde_json::from_str::<Ack>(&reply) {
            Ok(ack) if ack.status == ACK_STATUS_CREATED => Ok(true),
            Ok(ack) => {
                warn!(event_id = event.id, status = ack.status, "Explorer did not accept sync event");
                Ok(false)
            }
            Err(err) => {
                warn!(event_id = event.id, reply = %reply, error = %err, "Unreadable explorer acknowledgement");
                Ok(false)
            }
        }
    }

    async fn connect(&self) -> Result<ExplorerStream, SyncError> {
        let mut request = self.params.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(ACCESS_KEY_HEADER, header_value(&self.params.access_key)?);
        headers.insert(SECRET_HEADER, header_value(&self.params.secret)?);

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| SyncError::Connect { url: self.params.url.to_string(), message: e.to_string() })?;
        info!(url = %self.params.url, "Connected to explorer");
        Ok(stream)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, SyncError> {
    HeaderValue::from_str(value).map_err(|e| SyncError::InvalidHeader(e.to_string()))
}

/// Next data frame; control frames are skipped.
async fn next_text(stream: &mut ExplorerStream) -> Result<String, SyncError> {
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => return Ok(text),
            Message::Binary(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Message::Close(_) => return Err(SyncError::ConnectionClosed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
    Err(SyncError::ConnectionClosed)
}
