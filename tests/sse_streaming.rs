//! Integration coverage for the inference runner's SSE handling against a
//! fake server, beyond what the parser's own unit tests exercise.

use chatbench::experiment::{run_bounded, BoundedExperimentConfig};
use chatbench::models::{Experiment, Status};
use chatbench::store::read::fetch_measurements;
use chatbench::store::Store;
use chatbench::write_queue::WriteQueue;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run_single_request(sse_body: &str) -> chatbench::models::Measurement {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("bench.db")).unwrap();
    let experiment_id = store
        .create_experiment(&Experiment::new("sse-test", None))
        .unwrap();
    let write_handle = WriteQueue::spawn(store.path().to_path_buf(), 1);
    let write_queue = write_handle.queue();

    let config = BoundedExperimentConfig {
        experiment_id,
        endpoint: server.uri(),
        model: "test-model".to_string(),
        num_runners: 1,
        num_tasks: 1,
        max_tokens: 16,
        seed: 1,
        prompts: vec!["say hi".to_string()],
        signer: None,
        account_address: String::new(),
        api_key: None,
        no_sign: true,
        old_sign: false,
    };
    run_bounded(config, &store, &write_queue).await.unwrap();
    write_handle.stop().await;

    let conn = store.read_connection().unwrap();
    fetch_measurements(&conn, experiment_id).unwrap().remove(0)
}

#[tokio::test]
async fn s3_empty_first_content_is_tolerated_once() {
    let body = concat!(
        "data:{\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
        "data:{\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
        "data:{\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":1}}\n\n",
        "data:[DONE]\n\n",
    );
    let measurement = run_single_request(body).await;
    assert_eq!(measurement.status, Status::Success);
}

#[tokio::test]
async fn s4_missing_usage_is_a_failure() {
    let body = concat!(
        "data:{\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
        "data:[DONE]\n\n",
    );
    let measurement = run_single_request(body).await;
    assert_eq!(measurement.status, Status::Failed);
}

#[tokio::test]
async fn empty_stream_with_no_content_chunks_is_a_failure() {
    let body = "data:[DONE]\n\n";
    let measurement = run_single_request(body).await;
    assert_eq!(measurement.status, Status::Failed);
}
