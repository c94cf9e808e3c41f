//! HTTP-level tests for the chat completions client against a mock server.

use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> ChatRequest {
    ChatRequest::new("gpt-3.5-turbo")
        .message(Message::system("You are a helpful assistant."))
        .message(Message::user("What is this document about?"))
        .temperature(0.3)
        .max_tokens(800)
}

async fn client_for(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new("sk-test").with_endpoint(format!("{}/v1/chat/completions", server.uri()))
}

#[tokio::test]
async fn test_successful_completion_returns_first_choice() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 800,
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "What is this document about?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "It is a quarterly report."}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 6, "total_tokens": 16}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).await.chat_completion(request()).await.unwrap();

    assert_eq!(response.content, "It is a quarterly report.");
    assert_eq!(response.usage.unwrap().total_tokens, 16);
}

#[tokio::test]
async fn test_unauthorized_surfaces_structured_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Invalid API key"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).await.chat_completion(request()).await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Invalid API key");
}

#[tokio::test]
async fn test_plain_text_error_body_is_quoted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.chat_completion(request()).await.unwrap_err();

    match err {
        OpenAIError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "API responded with status 503: upstream unavailable");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_choices_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).await.chat_completion(request()).await.unwrap_err();
    assert!(matches!(err, OpenAIError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let client = OpenAIClient::new("sk-test").with_endpoint("http://127.0.0.1:9/v1/chat/completions");
    let err = client.chat_completion(request()).await.unwrap_err();
    assert!(matches!(err, OpenAIError::Network(_)));
}
