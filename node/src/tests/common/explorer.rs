use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// In-process explorer: records every pushed body and answers with the
/// configured status. A status of 0 means "never reply".
pub struct ExplorerServer {
    pub url: Url,
    pub received: mpsc::UnboundedReceiver<String>,
    status: Arc<AtomicU16>,
    headers: Arc<Mutex<Vec<(String, String)>>>,
    handle: JoinHandle<()>,
}

impl ExplorerServer {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();
        let (sender, received) = mpsc::unbounded_channel();
        let status = Arc::new(AtomicU16::new(status));
        let headers = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let status = status.clone();
            let headers = headers.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let sender = sender.clone();
                    let status = status.clone();
                    let headers = headers.clone();
                    tokio::spawn(async move {
                        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                            let mut seen = headers.lock().unwrap();
                            for (name, value) in request.headers() {
                                seen.push((name.to_string(), value.to_str().unwrap_or_default().to_string()));
                            }
                            Ok(response)
                        };
                        let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                            return;
                        };
                        while let Some(Ok(message)) = ws.next().await {
                            if let Message::Text(body) = message {
                                let _ = sender.send(body);
                                let status = status.load(Ordering::SeqCst);
                                if status != 0 && ws.send(Message::Text(json!({"status": status}).to_string())).await.is_err() {
                                    return;
                                }
                            }
                        }
                    });
                }
            })
        };

        Self { url, received, status, headers, handle }
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Value of a handshake header, names compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.lock().unwrap().iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
    }
}

impl Drop for ExplorerServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
