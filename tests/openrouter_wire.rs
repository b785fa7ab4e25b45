//! Wire-level tests for the chat-completions dialect, served by wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use samovar::{ChatMessage, Conversation, LlmError, Sampler, SamplerConfig, models};

fn convo() -> Conversation {
    Conversation::new(vec![
        ChatMessage::system("solve the puzzle"),
        ChatMessage::user("grid incoming"),
    ])
    .unwrap()
}

fn sampler_for(server: &MockServer) -> Sampler {
    let mut config = SamplerConfig::default().with_openrouter_base_url(server.uri());
    config.credentials.openrouter = Some(SecretString::from("test-key".to_string()));
    Sampler::new(config)
}

#[tokio::test]
async fn completion_text_and_usage_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "openrouter/custom" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "[[7, 7], [7, 7]]" } }],
            "usage": {
                "prompt_tokens": 100,
                "completion_tokens": 9,
                "prompt_tokens_details": { "cached_tokens": 40 }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = sampler_for(&server)
        .sample_one(&convo(), &models::OPENROUTER_CUSTOM, 0.7)
        .await
        .unwrap();

    assert_eq!(sample.text, "[[7, 7], [7, 7]]");
    assert_eq!(sample.usage.input_tokens, 60);
    assert_eq!(sample.usage.cache_read_tokens, 40);
    assert_eq!(sample.usage.output_tokens, 9);
}

#[tokio::test]
async fn fanout_returns_one_sample_per_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let samples = sampler_for(&server)
        .sample_n(&convo(), &models::OPENROUTER_CUSTOM, 0.7, 3)
        .await;

    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|s| s.text == "ok"));
}

#[tokio::test]
async fn auth_failure_is_fatal_after_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = sampler_for(&server)
        .sample_one(&convo(), &models::OPENROUTER_CUSTOM, 0.7)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::AuthInvalid { .. }));
}

#[tokio::test]
async fn auth_failure_fanout_yields_absent_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(2)
        .mount(&server)
        .await;

    let samples = sampler_for(&server)
        .sample_n(&convo(), &models::OPENROUTER_CUSTOM, 0.7, 2)
        .await;
    assert!(samples.is_empty());
}

#[tokio::test]
async fn empty_choices_surface_as_no_choices_with_diagnostic_dump() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "usage": { "prompt_tokens": 1, "completion_tokens": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = sampler_for(&server)
        .sample_one(&convo(), &models::OPENROUTER_CUSTOM, 0.7)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::NoChoicesReturned { .. }));

    let dump = std::path::Path::new(samovar::providers::openrouter::DIAGNOSTIC_DUMP_PATH);
    assert!(dump.exists(), "conversation dump should have been written");
    let dumped = std::fs::read_to_string(dump).unwrap();
    assert!(dumped.contains("grid incoming"));
    let _ = std::fs::remove_file(dump);
}

#[tokio::test]
async fn streamed_attempt_accumulates_deltas_and_writes_transcript() {
    let server = MockServer::start().await;
    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"[[1, \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"2]]\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":4}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body.as_bytes(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transcripts = tempfile::tempdir().unwrap();
    let mut config = SamplerConfig::default()
        .with_openrouter_base_url(server.uri())
        .with_streaming(true)
        .with_transcript_dir(transcripts.path());
    config.credentials.openrouter = Some(SecretString::from("test-key".to_string()));
    let sampler = Sampler::new(config);

    let samples = sampler
        .sample_n(&convo(), &models::OPENROUTER_CUSTOM, 0.7, 1)
        .await;

    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].text, "[[1, 2]]");
    assert_eq!(samples[0].usage.input_tokens, 12);
    assert_eq!(samples[0].usage.output_tokens, 4);

    let transcript_files: Vec<_> = std::fs::read_dir(transcripts.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(transcript_files.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&transcript_files[0]).unwrap(),
        "[[1, 2]]"
    );
}

#[tokio::test]
async fn caller_conversation_is_not_mutated_by_sends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let conversation = convo();
    let before = conversation.clone();
    sampler_for(&server)
        .sample_n(&conversation, &models::OPENROUTER_CUSTOM, 0.7, 2)
        .await;
    assert_eq!(conversation, before);
}
