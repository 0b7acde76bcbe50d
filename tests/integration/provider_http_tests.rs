/*!
 * HTTP backends against a local one-shot server
 */

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use yadtwai::document::ContentSegment;
use yadtwai::errors::{ErrorKind, ProviderError};
use yadtwai::providers::anthropic::Anthropic;
use yadtwai::providers::openai::OpenAiCompatible;
use yadtwai::providers::{CompletionRequest, Provider};
use yadtwai::translation::{ClientSettings, TranslationClient};

/// Serve exactly one request with the given status and body.
///
/// The handle resolves to the raw request text, lower-cased.
async fn serve_once(status: u16, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{}", address), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&data).to_lowercase();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_lowercase()
}

fn openai(endpoint: &str) -> OpenAiCompatible {
    OpenAiCompatible::new("OpenAI", "sk-test", format!("{}/v1", endpoint), "gpt-test", Duration::from_secs(5)).unwrap()
}

fn chat_reply(content: &str) -> String {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
}

#[tokio::test]
async fn test_openAiComplete_withSuccess_shouldReturnContentAndSendBearerKey() {
    let (endpoint, server) = serve_once(200, chat_reply("Bonjour")).await;

    let text = openai(&endpoint).complete(CompletionRequest::new("sys", "Hello")).await.unwrap();

    assert_eq!(text, "Bonjour");
    let request = server.await.unwrap();
    assert!(request.starts_with("post /v1/chat/completions"));
    assert!(request.contains("authorization: bearer sk-test"));
    assert!(request.contains("\"model\":\"gpt-test\""));
}

#[tokio::test]
async fn test_openAiComplete_withErrorStatuses_shouldClassifyFailures() {
    let cases = [
        (401, ErrorKind::Authentication),
        (403, ErrorKind::Authentication),
        (429, ErrorKind::RateLimited),
        (503, ErrorKind::Unavailable),
        (400, ErrorKind::Rejected),
    ];

    for (status, expected) in cases {
        let (endpoint, server) = serve_once(status, r#"{"error":"nope"}"#.to_string()).await;
        let error = openai(&endpoint).complete(CompletionRequest::new("", "Hello")).await.unwrap_err();
        assert_eq!(error.kind(), expected, "status {}", status);
        server.await.unwrap();
    }
}

#[tokio::test]
async fn test_openAiComplete_withUnexpectedBody_shouldReportParseError() {
    let (endpoint, server) = serve_once(200, r#"{"unexpected": true}"#.to_string()).await;

    let error = openai(&endpoint).complete(CompletionRequest::new("", "Hello")).await.unwrap_err();

    assert!(matches!(error, ProviderError::ParseError(_)));
    assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    server.await.unwrap();
}

#[tokio::test]
async fn test_openAiComplete_withClosedPort_shouldReportConnectionError() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let error = openai(&format!("http://{}", address))
        .complete(CompletionRequest::new("", "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(error, ProviderError::ConnectionError(_)));
    assert_eq!(error.kind(), ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_openAiComplete_withSilentServer_shouldTimeOut() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let provider = OpenAiCompatible::new(
        "OpenAI",
        "",
        format!("http://{}/v1", address),
        "gpt-test",
        Duration::from_millis(200),
    )
    .unwrap();
    let error = provider.complete(CompletionRequest::new("", "Hello")).await.unwrap_err();

    assert!(matches!(error, ProviderError::Timeout(_)));
    assert_eq!(error.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_anthropicComplete_withSuccess_shouldJoinTextBlocks() {
    let body = json!({ "content": [{ "type": "text", "text": "Guten " }, { "type": "text", "text": "Tag" }] }).to_string();
    let (endpoint, server) = serve_once(200, body).await;

    let provider = Anthropic::new("key-123", endpoint, "claude-test", Duration::from_secs(5)).unwrap();
    let text = provider.complete(CompletionRequest::new("sys", "Hello")).await.unwrap();

    assert_eq!(text, "Guten Tag");
    let request = server.await.unwrap();
    assert!(request.starts_with("post /v1/messages"));
    assert!(request.contains("x-api-key: key-123"));
    assert!(request.contains("anthropic-version: 2023-06-01"));
}

#[tokio::test]
async fn test_anthropicComplete_withOverloaded_shouldBeRecoverable() {
    let (endpoint, server) = serve_once(529, r#"{"type":"error"}"#.to_string()).await;

    let provider = Anthropic::new("key", endpoint, "claude-test", Duration::from_secs(5)).unwrap();
    let error = provider.complete(CompletionRequest::new("", "Hello")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Unavailable);
    assert!(error.kind().is_recoverable());
    server.await.unwrap();
}

#[tokio::test]
async fn test_translateBatch_overHttp_shouldParseFencedReply() {
    let reply = "```json\n[{\"id\": 0, \"translation\": \"Un\"}, {\"id\": 1, \"translation\": \"Deux\"}]\n```";
    let (endpoint, server) = serve_once(200, chat_reply(reply)).await;
    let client = TranslationClient::new(Arc::new(openai(&endpoint)), ClientSettings::default());
    let batch = vec![ContentSegment::text(0, "One"), ContentSegment::text(1, "Two")];

    let result = client.translate_batch(&batch, "", None).await.unwrap();

    assert_eq!(result.translations, vec!["Un".to_string(), "Deux".to_string()]);
    assert!(result.missing.is_empty());
    let request = server.await.unwrap();
    assert!(request.contains("two"));
}
