use std::sync::Arc;

use concord_harness::gateway::{
    Attribution, EmbedModelRef, EmbeddingGateway, GatewayError, ModelGateway, ModelRef,
    NoopUsageSink, OllamaAdapter,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> OllamaAdapter {
    OllamaAdapter::new(server.uri(), Arc::new(NoopUsageSink)).unwrap()
}

#[tokio::test]
async fn generate_parses_answer_and_confidence() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"format": "json", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "{\"answer\": \"Paris\", \"self_confidence\": 0.95}"
        })))
        .mount(&server)
        .await;

    let answer = adapter(&server)
        .answer(
            &ModelRef::new("gemma2:2b"),
            "What is the capital of France?",
            &Attribution::new("test"),
        )
        .await
        .unwrap();

    assert_eq!(answer.text, "Paris");
    assert!((answer.self_confidence - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn generate_clamps_out_of_range_confidence() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "{\"answer\": \"Paris\", \"self_confidence\": 1.7}"
        })))
        .mount(&server)
        .await;

    let answer = adapter(&server)
        .answer(&ModelRef::new("gemma2:2b"), "hi", &Attribution::new("test"))
        .await
        .unwrap();

    assert_eq!(answer.self_confidence, 1.0);
}

#[tokio::test]
async fn generate_defaults_missing_keys() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "{}"
        })))
        .mount(&server)
        .await;

    let answer = adapter(&server)
        .answer(&ModelRef::new("gemma2:2b"), "hi", &Attribution::new("test"))
        .await
        .unwrap();

    assert_eq!(answer.text, "");
    assert_eq!(answer.self_confidence, 0.0);
}

#[tokio::test]
async fn generate_fails_hard_on_malformed_answer_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Paris, of course!"
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .answer(&ModelRef::new("gemma2:2b"), "hi", &Attribution::new("test"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidPayload { .. }), "got {err:?}");
}

#[tokio::test]
async fn generate_surfaces_backend_errors_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "model not loaded"
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .answer(&ModelRef::new("gemma2:2b"), "hi", &Attribution::new("test"))
        .await
        .unwrap_err();

    match err {
        GatewayError::Backend {
            message,
            http_status,
            ..
        } => {
            assert_eq!(message, "model not loaded");
            assert_eq!(http_status, Some(500));
        }
        other => panic!("expected Backend, got {other:?}"),
    }
}

#[tokio::test]
async fn embed_returns_vector() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({"model": "nomic-embed-text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.1, -0.2, 0.3]
        })))
        .mount(&server)
        .await;

    let vector = adapter(&server)
        .embed(
            "Paris",
            &EmbedModelRef::new("nomic-embed-text"),
            &Attribution::new("test"),
        )
        .await
        .unwrap();

    assert_eq!(vector, vec![0.1, -0.2, 0.3]);
}

#[tokio::test]
async fn embed_fails_when_embedding_missing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .embed(
            "Paris",
            &EmbedModelRef::new("nomic-embed-text"),
            &Attribution::new("test"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidPayload { .. }), "got {err:?}");
}

#[tokio::test]
async fn token_generation_parses_logprobs() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"logprobs": true, "top_logprobs": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "Paris" },
                "logprobs": {
                    "content": [{
                        "token": "Paris",
                        "logprob": -0.105,
                        "top_logprobs": [
                            { "token": "Paris", "logprob": -0.105 },
                            { "token": "London", "logprob": -3.2 }
                        ]
                    }]
                }
            }]
        })))
        .mount(&server)
        .await;

    let generation = adapter(&server)
        .answer_with_tokens(
            &ModelRef::new("gemma2:2b"),
            "capital of France?",
            256,
            5,
            &Attribution::new("test"),
        )
        .await;

    assert!(generation.error.is_none());
    assert_eq!(generation.text, "Paris");
    assert_eq!(generation.per_token.len(), 1);

    let token = &generation.per_token[0];
    assert_eq!(token.token, "Paris");
    assert!((token.prob - (-0.105f64).exp()).abs() < 1e-9);
    assert_eq!(token.topk.len(), 2);
    assert_eq!(token.topk[1].token, "London");
    assert!((token.topk[1].prob - (-3.2f64).exp()).abs() < 1e-9);
}

#[tokio::test]
async fn token_generation_degrades_instead_of_failing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "no such model" }
        })))
        .mount(&server)
        .await;

    let generation = adapter(&server)
        .answer_with_tokens(
            &ModelRef::new("missing:model"),
            "hi",
            256,
            5,
            &Attribution::new("test"),
        )
        .await;

    assert_eq!(generation.error.as_deref(), Some("no such model"));
    assert!(generation.text.is_empty());
    assert!(generation.per_token.is_empty());
}
