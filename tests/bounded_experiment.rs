//! End-to-end bounded-mode test against a fake SSE endpoint.

use chatbench::experiment::{run_bounded, BoundedExperimentConfig};
use chatbench::models::{Experiment, Status};
use chatbench::store::read::fetch_measurements;
use chatbench::store::Store;
use chatbench::write_queue::WriteQueue;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = concat!(
    "data:{\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
    "data:{\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
    "data:{\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n",
    "data:[DONE]\n\n",
);

#[tokio::test]
async fn bounded_run_against_a_fake_server_produces_success_measurements() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(SSE_BODY),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bench.db");
    let store = Store::open(&db_path).unwrap();
    let experiment = Experiment::new("integration-test", None);
    let experiment_id = store.create_experiment(&experiment).unwrap();

    let write_handle = WriteQueue::spawn(store.path().to_path_buf(), 2);
    let write_queue = write_handle.queue();

    let config = BoundedExperimentConfig {
        experiment_id,
        endpoint: server.uri(),
        model: "test-model".to_string(),
        num_runners: 2,
        num_tasks: 3,
        max_tokens: 16,
        seed: 1,
        prompts: vec!["say hi".to_string()],
        signer: None,
        account_address: String::new(),
        api_key: None,
        no_sign: true,
        old_sign: false,
    };

    let metrics = run_bounded(config, &store, &write_queue).await.unwrap();
    write_handle.stop().await;

    assert!(metrics.get(&chatbench::models::MetricName::Rps).unwrap() > 0.0);

    let conn = store.read_connection().unwrap();
    let measurements = fetch_measurements(&conn, experiment_id).unwrap();
    assert_eq!(measurements.len(), 3);
    for m in &measurements {
        assert_eq!(m.status, Status::Success);
        assert_eq!(m.n_input, 3);
        assert_eq!(m.n_output, 2);
    }
}

#[tokio::test]
async fn bounded_run_records_failures_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string(r#"{"error": {"message": "overloaded"}}"#),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bench.db");
    let store = Store::open(&db_path).unwrap();
    let experiment = Experiment::new("integration-test-failures", None);
    let experiment_id = store.create_experiment(&experiment).unwrap();

    let write_handle = WriteQueue::spawn(store.path().to_path_buf(), 2);
    let write_queue = write_handle.queue();

    let config = BoundedExperimentConfig {
        experiment_id,
        endpoint: server.uri(),
        model: "test-model".to_string(),
        num_runners: 1,
        num_tasks: 2,
        max_tokens: 16,
        seed: 1,
        prompts: vec!["say hi".to_string()],
        signer: None,
        account_address: String::new(),
        api_key: None,
        no_sign: true,
        old_sign: false,
    };

    let metrics = run_bounded(config, &store, &write_queue).await.unwrap();
    write_handle.stop().await;

    assert_eq!(
        metrics
            .get(&chatbench::models::MetricName::FailedRequests)
            .unwrap(),
        2.0
    );
}
