use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use assert_matches::assert_matches;
use rstest::*;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::core::client::database::RecordKind;
use crate::core::client::keystore::MockKeyStore;
use crate::error::RunError;
use crate::services::run_executor::RunExecutor;
use crate::tests::common::{
    receipt, TestConfigBuilder, TestNode, CHAIN_HEAD, GAS_PRICE_DEFAULT, MIN_CONTRACT_PAYMENT,
};
use crate::types::assets::Link;
use crate::types::job_spec::{InitiatorType, JobSpec, TaskSpec, TaskType};
use crate::types::params::ExplorerParams;
use crate::types::status::RunStatus;

fn explorer() -> ExplorerParams {
    ExplorerParams {
        url: Url::parse("ws://localhost:4321").unwrap(),
        access_key: "key".to_string(),
        secret: "secret".to_string(),
        push_interval: Duration::from_secs(60),
    }
}

fn ethtx_params() -> Value {
    json!({"address": Address::repeat_byte(0x11), "functionSelector": "0x12345678"})
}

#[fixture]
fn node() -> TestNode {
    TestConfigBuilder::new().build()
}

async fn start_run(executor: &RunExecutor, job: &JobSpec, input: Value, payment: Option<Link>) -> Uuid {
    executor.create_run(job.id, job.initiators[0].id, input, payment).await.unwrap().id
}

#[rstest]
#[tokio::test]
async fn noop_run_completes_with_its_input(node: TestNode) {
    let job = node.create_job(&[("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({"result": "100"}), None).await;

    let run = executor.execute(run_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());
    assert_eq!(run.data(), Some(&json!({"result": "100"})));

    let stored = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.result, run.result);
    assert_eq!(stored.error_string(), "");
    assert!(stored.task_runs.iter().all(|tr| tr.status == RunStatus::Completed));
}

#[rstest]
#[tokio::test]
async fn failing_task_stops_the_run(node: TestNode) {
    let job = node.create_job(&[("NoOp", json!({})), ("nonExistent", json!({})), ("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({"result": "100"}), None).await;

    let run = executor.execute(run_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Errored);
    assert!(run.error_string().contains("Adapter not found: nonexistent"));
    let statuses: Vec<RunStatus> = run.task_runs.iter().map(|tr| tr.status).collect();
    assert_eq!(statuses, vec![RunStatus::Completed, RunStatus::Errored, RunStatus::Unstarted]);

    let stored = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(stored.error_string(), run.error_string());
    assert_eq!(stored.data(), None);
    // the first task keeps what it produced
    assert_eq!(stored.task_runs[0].result.data, Some(json!({"result": "100"})));
    assert!(!stored.task_runs[0].result.has_error());
    assert!(stored.task_runs[1].result.has_error());
}

#[rstest]
#[tokio::test]
async fn payment_below_adapter_minimum_is_rejected(node: TestNode) {
    let job = node.create_job(&[("EthTx", ethtx_params())]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({"result": "1"}), Some(Link::from_juels(1))).await;

    let run = executor.execute(run_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Errored);
    assert!(run.error_string().starts_with("Rejecting job"));
    assert!(run.error_string().contains(&format!("below minimum contract payment {}", MIN_CONTRACT_PAYMENT)));
    assert_eq!(node.eth.call_count("eth_sendRawTransaction"), 0);
}

#[rstest]
#[tokio::test]
async fn payment_below_job_minimum_errors_the_run_on_creation(node: TestNode) {
    let job = JobSpec::new(
        vec![(InitiatorType::Web, json!({}))],
        vec![TaskSpec::new(TaskType::new("NoOp").unwrap(), json!({}))],
    )
    .unwrap()
    .with_min_payment(Link::from_juels(50));
    let job = node.database.create_job_spec(job).await.unwrap();
    let executor = RunExecutor::new(node.config.clone());

    let run = executor.create_run(job.id, job.initiators[0].id, json!({}), Some(Link::from_juels(49))).await.unwrap();

    assert_eq!(run.status, RunStatus::Errored);
    assert_matches!(executor.execute(run.id).await, Err(RunError::NotRunnable { .. }));
}

#[rstest]
#[tokio::test]
async fn runs_of_archived_jobs_are_refused(node: TestNode) {
    let job = node.create_job(&[("NoOp", json!({}))]).await;
    node.database.archive_job_spec(job.id).await.unwrap();
    let executor = RunExecutor::new(node.config.clone());

    assert_matches!(
        executor.create_run(job.id, job.initiators[0].id, json!({}), None).await,
        Err(RunError::JobSpecArchived(id)) if id == job.id
    );
    assert_matches!(
        executor.create_run(Uuid::new_v4(), job.initiators[0].id, json!({}), None).await,
        Err(RunError::DatabaseError(err)) if err.is_not_found()
    );
}

#[rstest]
#[tokio::test]
async fn unknown_initiator_is_refused(node: TestNode) {
    let job = node.create_job(&[("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());

    assert_matches!(
        executor.create_run(job.id, Uuid::new_v4(), json!({}), None).await,
        Err(RunError::InitiatorNotFound { .. })
    );
}

#[rstest]
#[tokio::test]
async fn adapter_panic_errors_the_run() {
    let mut key_store = MockKeyStore::new();
    key_store.expect_accounts().returning(|| Ok(vec![Address::repeat_byte(0xaa)]));
    key_store.expect_sign().returning(|_, _| panic!("signer exploded"));
    let node = TestConfigBuilder::new().configure_key_store(Arc::new(key_store)).build();
    node.eth.with_healthy_chain(0);
    node.register_accounts().await;

    let job = node.create_job(&[("EthTx", ethtx_params())]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({"result": "1"}), None).await;

    let run = executor.execute(run_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Errored);
    assert_eq!(run.error_string(), "Panic: signer exploded");
}

#[rstest]
#[tokio::test]
async fn ethtx_run_waits_for_confirmations_then_continues(node: TestNode) {
    node.eth.with_healthy_chain(0);
    node.register_accounts().await;
    let job = node.create_job(&[("EthTx", ethtx_params()), ("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());
    executor.resume_pending_confirmations(10).await.unwrap();
    let run_id = start_run(&executor, &job, json!({"result": "0x2a"}), None).await;

    let run = executor.execute(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::PendingConfirmations);
    assert_eq!(run.creation_height, Some(10));
    let tx_id: Uuid = serde_json::from_value(run.data().unwrap()["txId"].clone()).unwrap();
    let tx = node.database.find_tx(tx_id).await.unwrap();
    assert_eq!(tx.to, Address::repeat_byte(0x11));
    let mut expected = vec![0x12, 0x34, 0x56, 0x78];
    expected.extend_from_slice(&[0u8; 31]);
    expected.push(0x2a);
    assert_eq!(tx.data, Bytes::from(expected));

    let attempt = node.config.tx_manager().attempts_for(tx_id).await.unwrap().remove(0);
    node.eth.register("eth_getTransactionReceipt", receipt(attempt.hash, 11));

    // mined but not deep enough
    executor.resume_pending_confirmations(15).await.unwrap();
    let run = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::PendingConfirmations);
    assert_eq!(run.observed_height, Some(15));

    executor.resume_pending_confirmations(22).await.unwrap();
    let run = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.observed_height, Some(22));
    assert_eq!(run.data().unwrap()["result"], json!(attempt.hash));
    assert_eq!(run.task_runs[1].status, RunStatus::Completed);
}

#[rstest]
#[tokio::test]
async fn transient_receipt_errors_keep_the_run_pending(node: TestNode) {
    node.eth.with_healthy_chain(0);
    node.register_accounts().await;
    let job = node.create_job(&[("EthTx", ethtx_params())]).await;
    let executor = RunExecutor::new(node.config.clone());
    executor.resume_pending_confirmations(10).await.unwrap();
    let run_id = start_run(&executor, &job, json!({"result": "0x2a"}), None).await;
    assert_eq!(executor.execute(run_id).await.unwrap().status, RunStatus::PendingConfirmations);

    node.eth.push_error("eth_getTransactionReceipt", "connection reset by peer");
    executor.resume_pending_confirmations(11).await.unwrap();

    let run = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::PendingConfirmations);
    assert_eq!(run.error_string(), "");
    assert_eq!(run.observed_height, Some(11));

    let tx_id: Uuid = serde_json::from_value(run.data().unwrap()["txId"].clone()).unwrap();
    let attempts = node.config.tx_manager().attempts_for(tx_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    node.eth.register("eth_getTransactionReceipt", receipt(attempts[0].hash, 11));

    executor.resume_pending_confirmations(22).await.unwrap();
    let run = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(node.database.find_tx(tx_id).await.unwrap().confirmed);
}

#[rstest]
#[tokio::test]
async fn ethtx_run_before_any_head_starts_at_the_chain_head(node: TestNode) {
    node.eth.with_healthy_chain(0);
    node.register_accounts().await;
    let job = node.create_job(&[("EthTx", ethtx_params())]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({"result": "0x2a"}), None).await;

    let run = executor.execute(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::PendingConfirmations);
    let tx_id: Uuid = serde_json::from_value(run.data().unwrap()["txId"].clone()).unwrap();
    let tx_manager = node.config.tx_manager();
    assert_eq!(tx_manager.attempts_for(tx_id).await.unwrap()[0].sent_at, CHAIN_HEAD);

    // one block later is well below the bump threshold
    executor.resume_pending_confirmations(CHAIN_HEAD + 1).await.unwrap();
    let attempts = tx_manager.attempts_for(tx_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].gas_price, GAS_PRICE_DEFAULT);
}

#[rstest]
#[tokio::test]
async fn ethtx_waits_for_a_head_when_the_chain_is_unreachable(node: TestNode) {
    node.eth.with_healthy_chain(0);
    node.register_accounts().await;
    node.eth.push_error("eth_blockNumber", "connection refused");
    let job = node.create_job(&[("EthTx", ethtx_params())]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({"result": "0x2a"}), None).await;

    let run = executor.execute(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::PendingConfirmations);
    assert_eq!(run.data().unwrap()["txId"], Value::Null);
    assert_eq!(node.eth.call_count("eth_sendRawTransaction"), 0);

    executor.resume_pending_confirmations(50).await.unwrap();
    let run = node.database.find_job_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::PendingConfirmations);
    let tx_id: Uuid = serde_json::from_value(run.data().unwrap()["txId"].clone()).unwrap();
    assert_eq!(node.config.tx_manager().attempts_for(tx_id).await.unwrap()[0].sent_at, 50);
    assert_eq!(node.eth.call_count("eth_sendRawTransaction"), 1);
}

#[rstest]
#[tokio::test]
async fn pending_run_can_be_cancelled(node: TestNode) {
    let job = node.create_job(&[("NoOpPend", json!({})), ("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({}), None).await;
    assert_eq!(executor.execute(run_id).await.unwrap().status, RunStatus::PendingConfirmations);

    let run = executor.cancel(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.finished_at.is_some());

    executor.resume_pending_confirmations(5).await.unwrap();
    assert_eq!(node.database.find_job_run(run_id).await.unwrap().status, RunStatus::Cancelled);
    assert_matches!(executor.cancel(run_id).await, Err(RunError::AlreadyFinished { .. }));
    assert_matches!(executor.execute(run_id).await, Err(RunError::NotRunnable { .. }));
}

#[rstest]
#[tokio::test]
async fn concurrent_runs_all_finish(node: TestNode) {
    let job = node.create_job(&[("NoOp", json!({})), ("NoOp", json!({}))]).await;
    let executor = Arc::new(RunExecutor::new(node.config.clone()));
    let mut handles = Vec::new();
    for i in 0..8 {
        let run_id = start_run(&executor, &job, json!({"result": i}), None).await;
        handles.push(executor.spawn(run_id));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, RunStatus::Completed);
    }
    assert_eq!(node.database.count_of(RecordKind::JobRun).await.unwrap(), 8);
}

#[rstest]
#[tokio::test]
async fn no_sync_events_without_an_explorer(node: TestNode) {
    let job = node.create_job(&[("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({}), None).await;
    executor.execute(run_id).await.unwrap();

    assert!(node.database.sync_events().await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn every_run_change_writes_a_sync_event() {
    let node = TestConfigBuilder::new().configure_params(|params| params.explorer = Some(explorer())).build();
    let job = node.create_job(&[("NoOp", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());

    let run_id = start_run(&executor, &job, json!({}), None).await;
    let events = node.database.sync_events().await.unwrap();
    assert_eq!(events.len(), 1);
    let body: Value = serde_json::from_str(&events[0].body).unwrap();
    assert_eq!(body["runId"], json!(run_id));
    assert_eq!(body["status"], json!("unstarted"));

    executor.execute(run_id).await.unwrap();
    let events = node.database.sync_events().await.unwrap();
    // started, then completed
    assert_eq!(events.len(), 3);
    let last: Value = serde_json::from_str(&events[2].body).unwrap();
    assert_eq!(last["status"], json!("completed"));
}

#[rstest]
#[tokio::test]
async fn rechecking_a_pending_run_writes_no_sync_event() {
    let node = TestConfigBuilder::new().configure_params(|params| params.explorer = Some(explorer())).build();
    let job = node.create_job(&[("NoOpPend", json!({}))]).await;
    let executor = RunExecutor::new(node.config.clone());
    let run_id = start_run(&executor, &job, json!({}), None).await;
    executor.execute(run_id).await.unwrap();
    let before = node.database.sync_events().await.unwrap().len();

    executor.resume_pending_confirmations(7).await.unwrap();

    assert_eq!(node.database.sync_events().await.unwrap().len(), before);
    assert_eq!(node.database.find_job_run(run_id).await.unwrap().observed_height, Some(7));
}
