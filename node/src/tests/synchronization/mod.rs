use std::sync::Arc;
use std::time::Duration;

use rstest::*;
use tokio::sync::Notify;

use crate::core::client::database::{DatabaseClient, InMemoryDatabase};
use crate::services::synchronization::{StatsPusher, SyncError};
use crate::tests::common::eventually;
use crate::tests::common::explorer::ExplorerServer;
use crate::types::params::ExplorerParams;
use crate::types::sync_event::SyncEvent;
use crate::utils::ticker::{ManualTrigger, Ticker};

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

struct Harness {
    database: Arc<dyn DatabaseClient>,
    notifier: Arc<Notify>,
    pusher: Arc<StatsPusher>,
    trigger: ManualTrigger,
    server: ExplorerServer,
}

async fn harness(status: u16) -> Harness {
    let server = ExplorerServer::start(status).await;
    let database: Arc<dyn DatabaseClient> = Arc::new(InMemoryDatabase::new(Duration::from_secs(5)));
    let notifier = Arc::new(Notify::new());
    let params = ExplorerParams {
        url: server.url.clone(),
        access_key: "abcdef".to_string(),
        secret: "opensesame".to_string(),
        push_interval: Duration::from_secs(3600),
    };
    let (ticker, trigger) = Ticker::manual();
    let pusher = Arc::new(
        StatsPusher::new(database.clone(), params, notifier.clone())
            .with_ticker(ticker)
            .with_ack_timeout(Duration::from_millis(200)),
    );
    pusher.start().await.unwrap();
    Harness { database, notifier, pusher, trigger, server }
}

fn event(body: &str) -> SyncEvent {
    SyncEvent { id: 0, body: body.to_string(), created_at: chrono::Utc::now() }
}

impl Harness {
    async fn next_body(&mut self) -> String {
        tokio::time::timeout(RECEIVE_TIMEOUT, self.server.received.recv()).await.unwrap().unwrap()
    }

    async fn stored_events(&self) -> usize {
        self.database.sync_events().await.unwrap().len()
    }

    async fn wait_until_drained(&self) -> bool {
        let database = self.database.clone();
        eventually(move || {
            let database = database.clone();
            async move { database.sync_events().await.unwrap().is_empty() }
        })
        .await
    }
}

#[rstest]
#[tokio::test]
async fn acknowledged_events_are_deleted() {
    let mut h = harness(201).await;
    h.database.create_sync_event(event(r#"{"run":1}"#)).await.unwrap();

    h.trigger.fire();

    assert_eq!(h.next_body().await, r#"{"run":1}"#);
    assert!(h.wait_until_drained().await);
    assert_eq!(h.server.header("X-Explorer-AccessKey").as_deref(), Some("abcdef"));
    assert_eq!(h.server.header("X-Explorer-Secret").as_deref(), Some("opensesame"));
    h.pusher.close().await;
}

#[rstest]
#[tokio::test]
async fn rejected_events_are_kept_for_retry() {
    let mut h = harness(500).await;
    h.database.create_sync_event(event(r#"{"run":1}"#)).await.unwrap();

    h.trigger.fire();
    assert_eq!(h.next_body().await, r#"{"run":1}"#);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.stored_events().await, 1);

    h.server.set_status(201);
    h.trigger.fire();
    assert_eq!(h.next_body().await, r#"{"run":1}"#);
    assert!(h.wait_until_drained().await);
    h.pusher.close().await;
}

#[rstest]
#[tokio::test]
async fn unacknowledged_events_are_kept() {
    let mut h = harness(0).await;
    h.database.create_sync_event(event(r#"{"run":1}"#)).await.unwrap();

    h.trigger.fire();
    assert_eq!(h.next_body().await, r#"{"run":1}"#);
    // past the ack timeout
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.stored_events().await, 1);
    h.pusher.close().await;
}

#[rstest]
#[tokio::test]
async fn new_event_notification_starts_a_push() {
    let mut h = harness(201).await;
    h.database.create_sync_event(event(r#"{"run":2}"#)).await.unwrap();

    h.notifier.notify_one();

    assert_eq!(h.next_body().await, r#"{"run":2}"#);
    assert!(h.wait_until_drained().await);
    h.pusher.close().await;
}

#[rstest]
#[tokio::test]
async fn events_are_pushed_in_creation_order() {
    let mut h = harness(201).await;
    for i in 0..3 {
        h.database.create_sync_event(event(&format!(r#"{{"run":{i}}}"#))).await.unwrap();
    }

    h.trigger.fire();

    for i in 0..3 {
        assert_eq!(h.next_body().await, format!(r#"{{"run":{i}}}"#));
    }
    assert!(h.wait_until_drained().await);
    h.pusher.close().await;
}

#[rstest]
#[tokio::test]
async fn pusher_starts_once() {
    let h = harness(201).await;
    assert!(matches!(h.pusher.start().await, Err(SyncError::AlreadyStarted)));
    h.pusher.close().await;
}
