//! Offline-mode behavior: canned samples, zero usage, zero network.

use samovar::{ChatMessage, Conversation, Sampler, SamplerConfig, TokenUsage, models};
use wiremock::MockServer;

fn convo() -> Conversation {
    Conversation::new(vec![
        ChatMessage::system("solve the puzzle"),
        ChatMessage::user("grid incoming"),
    ])
    .unwrap()
}

#[tokio::test]
async fn offline_fanout_never_touches_the_network() {
    let server = MockServer::start().await;
    let config = SamplerConfig::default()
        .with_offline(true)
        .with_openrouter_base_url(server.uri());
    let sampler = Sampler::new(config);

    let samples = sampler
        .sample_n(&convo(), &models::OPENROUTER_CUSTOM, 0.7, 3)
        .await;

    assert_eq!(samples.len(), 3);
    for sample in &samples {
        assert_eq!(sample.text, "[[1, 2, 3], [4, 5, 6]]");
        assert_eq!(sample.usage, TokenUsage::default());
    }
    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "offline mode must not issue HTTP requests"
    );
}

#[tokio::test]
async fn zero_requested_samples_short_circuits() {
    let server = MockServer::start().await;
    let config = SamplerConfig::default().with_openrouter_base_url(server.uri());
    let sampler = Sampler::new(config);

    let samples = sampler
        .sample_n(&convo(), &models::OPENROUTER_CUSTOM, 0.7, 0)
        .await;

    assert!(samples.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_single_sample_parses_as_grid() {
    let sampler = Sampler::new(SamplerConfig::default().with_offline(true));
    let sample = sampler
        .sample_one(&convo(), &models::CLAUDE_3_5_SONNET, 0.0)
        .await
        .unwrap();
    let grids = samovar::parse::parse_grids(&sample.text);
    assert_eq!(grids, vec![vec![vec![1, 2, 3], vec![4, 5, 6]]]);
}
