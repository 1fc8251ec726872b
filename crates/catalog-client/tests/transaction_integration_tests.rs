//! Integration tests for the transaction lifecycle using wiremock.
//!
//! These tests verify:
//! - Commit semantics on the dataset view (snapshot collapse vs extension)
//! - Abort leaves the view untouched
//! - The two-step start/set-type protocol
//! - Scoped transactions (commit on success, abort-and-wrap on failure)
//! - Terminal-state misuse surfaces as a caller error without remote calls

use std::time::Duration;

use atlas_catalog_client::{
    ClientConfig, ClientError, Dataset, DatasetOptions, DatasetsClient, ResourceIdentifier,
    TransactionStatus, TransactionType,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATASET_RID: &str = "ri.foundry.main.dataset.0";

fn rid(s: &str) -> ResourceIdentifier {
    ResourceIdentifier::parse(s).unwrap()
}

fn test_client(server: &MockServer) -> DatasetsClient {
    let config = ClientConfig::builder(server.uri())
        .timeout(Duration::from_secs(5))
        .max_retries(2)
        .retry_initial_delay(Duration::from_millis(10))
        .retry_max_delay(Duration::from_millis(50))
        .build()
        .unwrap();
    DatasetsClient::new(config).unwrap()
}

/// A dataset pinned to (T1, T2) without any remote resolution.
async fn pinned_dataset(client: &DatasetsClient) -> Dataset {
    client
        .dataset_with(
            DATASET_RID,
            DatasetOptions {
                transaction_range: Some((
                    rid("ri.foundry.main.transaction.1"),
                    rid("ri.foundry.main.transaction.2"),
                )),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

/// Mount the start + set-type pair returning the given transaction rid.
async fn mount_open_transaction(server: &MockServer, txn_rid: &str, txn_type: &str) {
    // consumed after one match so a later open can mount a fresh response
    Mock::given(method("POST"))
        .and(path(format!("/catalog/datasets/{DATASET_RID}/transactions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "rid": txn_rid,
            "type": "APPEND",
            "status": "OPEN"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
    if txn_type != "APPEND" {
        Mock::given(method("POST"))
            .and(path(format!(
                "/catalog/datasets/{DATASET_RID}/transactions/{txn_rid}"
            )))
            .and(body_json(serde_json::json!({"type": txn_type})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rid": txn_rid,
                "type": txn_type,
                "status": "OPEN"
            })))
            .expect(1)
            .mount(server)
            .await;
    }
}

async fn mount_commit(server: &MockServer, txn_rid: &str) {
    Mock::given(method("POST"))
        .and(path(format!(
            "/catalog/datasets/{DATASET_RID}/transactions/{txn_rid}/commit"
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_abort(server: &MockServer, txn_rid: &str) {
    Mock::given(method("POST"))
        .and(path(format!(
            "/catalog/datasets/{DATASET_RID}/transactions/{txn_rid}/abort"
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_update_commit_extends_range_then_snapshot_collapses_it() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;

    // UPDATE commit: (T1, T2) -> (T1, T3)
    mount_open_transaction(&server, "ri.foundry.main.transaction.3", "UPDATE").await;
    mount_commit(&server, "ri.foundry.main.transaction.3").await;

    let mut txn = dataset
        .start_transaction(TransactionType::Update)
        .await
        .unwrap();
    assert_eq!(txn.status(), TransactionStatus::Open);
    assert_eq!(txn.txn_type(), TransactionType::Update);
    txn.commit().await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::Committed);
    assert_eq!(
        dataset.view(),
        (
            Some(rid("ri.foundry.main.transaction.1")),
            Some(rid("ri.foundry.main.transaction.3"))
        )
    );

    // SNAPSHOT commit: (T1, T3) -> (T4, T4)
    mount_open_transaction(&server, "ri.foundry.main.transaction.4", "SNAPSHOT").await;
    mount_commit(&server, "ri.foundry.main.transaction.4").await;

    let mut txn = dataset
        .start_transaction(TransactionType::Snapshot)
        .await
        .unwrap();
    txn.commit().await.unwrap();
    assert_eq!(
        dataset.view(),
        (
            Some(rid("ri.foundry.main.transaction.4")),
            Some(rid("ri.foundry.main.transaction.4"))
        )
    );
}

#[tokio::test]
async fn test_append_skips_the_set_type_round_trip() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;

    // only the start call is mounted; a set-type call would 404 and fail
    mount_open_transaction(&server, "ri.foundry.main.transaction.3", "APPEND").await;

    let txn = dataset
        .start_transaction(TransactionType::Append)
        .await
        .unwrap();
    assert_eq!(txn.txn_type(), TransactionType::Append);
    assert_eq!(txn.rid(), &rid("ri.foundry.main.transaction.3"));
}

#[tokio::test]
async fn test_abort_leaves_the_view_untouched() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;
    let view_before = dataset.view();

    mount_open_transaction(&server, "ri.foundry.main.transaction.3", "UPDATE").await;
    mount_abort(&server, "ri.foundry.main.transaction.3").await;

    let mut txn = dataset
        .start_transaction(TransactionType::Update)
        .await
        .unwrap();
    txn.abort().await.unwrap();

    assert_eq!(txn.status(), TransactionStatus::Aborted);
    assert_eq!(dataset.view(), view_before);
}

#[tokio::test]
async fn test_terminal_transaction_rejects_further_transitions() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;

    mount_open_transaction(&server, "ri.foundry.main.transaction.3", "UPDATE").await;
    // exactly one abort round trip; the second abort must fail locally
    mount_abort(&server, "ri.foundry.main.transaction.3").await;

    let mut txn = dataset
        .start_transaction(TransactionType::Update)
        .await
        .unwrap();
    txn.abort().await.unwrap();

    let err = txn.abort().await.unwrap_err();
    assert!(matches!(err, ClientError::TransactionNotOpen { .. }));

    let err = txn.commit().await.unwrap_err();
    assert!(matches!(err, ClientError::TransactionNotOpen { .. }));
    assert_eq!(dataset.view().1, Some(rid("ri.foundry.main.transaction.2")));

    let err = txn.write("late.txt", "too late".into()).await.unwrap_err();
    assert!(matches!(err, ClientError::TransactionNotOpen { .. }));
}

#[tokio::test]
async fn test_with_transaction_commits_on_success() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;

    mount_open_transaction(&server, "ri.foundry.main.transaction.3", "UPDATE").await;
    mount_commit(&server, "ri.foundry.main.transaction.3").await;

    let value = dataset
        .with_transaction(TransactionType::Update, |_txn| {
            Box::pin(async move { Ok(42) })
        })
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(dataset.view().1, Some(rid("ri.foundry.main.transaction.3")));
}

#[tokio::test]
async fn test_with_transaction_aborts_and_wraps_on_failure() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;
    let view_before = dataset.view();

    mount_open_transaction(&server, "ri.foundry.main.transaction.3", "UPDATE").await;
    mount_abort(&server, "ri.foundry.main.transaction.3").await;

    let err = dataset
        .with_transaction(TransactionType::Update, |_txn| {
            Box::pin(async move {
                Err::<(), _>(ClientError::InvalidResponse("synthetic failure".to_string()))
            })
        })
        .await
        .unwrap_err();

    match err {
        ClientError::TransactionAborted {
            transaction_rid,
            dataset_rid,
            source,
        } => {
            assert_eq!(transaction_rid, "ri.foundry.main.transaction.3");
            assert_eq!(dataset_rid, DATASET_RID);
            assert!(source.to_string().contains("synthetic failure"));
        }
        other => panic!("expected TransactionAborted, got {other:?}"),
    }
    assert_eq!(dataset.view(), view_before);
}

#[tokio::test]
async fn test_concurrent_open_surfaces_remote_error() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;

    Mock::given(method("POST"))
        .and(path(format!("/catalog/datasets/{DATASET_RID}/transactions")))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "errorName": "OpenTransactionAlreadyExists",
            "parameters": {"datasetRid": DATASET_RID},
            "errorInstanceId": "4cc2e1aa"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = dataset
        .start_transaction(TransactionType::Update)
        .await
        .unwrap_err();
    assert_eq!(err.rpc_name(), Some("OpenTransactionAlreadyExists"));
    match err {
        ClientError::Rpc(rpc) => {
            assert_eq!(rpc.status, 409);
            assert_eq!(rpc.error_instance_id.as_deref(), Some("4cc2e1aa"));
            assert_eq!(
                rpc.parameters.get("datasetRid").and_then(|v| v.as_str()),
                Some(DATASET_RID)
            );
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_transaction_is_not_retried_on_server_error() {
    let server = MockServer::start().await;
    let client = test_client(&server);
    let dataset = pinned_dataset(&client).await;

    // a retried POST would trip the expect(1) below
    Mock::given(method("POST"))
        .and(path(format!("/catalog/datasets/{DATASET_RID}/transactions")))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .expect(1)
        .mount(&server)
        .await;

    let err = dataset
        .start_transaction(TransactionType::Update)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ServerError { status: 503, .. }));
}
