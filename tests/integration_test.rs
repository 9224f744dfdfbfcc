use std::sync::{Arc, Mutex};

use base64::Engine as _;
use bedrock_claude::{CallOptions, Claude, Error, LanguageModel};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_chunk(completion: &str) -> String {
    let body = serde_json::json!({ "completion": completion }).to_string();
    let encoded = base64::engine::general_purpose::STANDARD.encode(body);
    format!("event: chunk\ndata: {{\"bytes\":\"{encoded}\"}}\n\n")
}

async fn claude_against(server: &MockServer) -> Claude {
    Claude::builder("us-east-1")
        .base_url(server.uri())
        .bearer_token("test-token")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_buffered_call_returns_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-v2/invoke"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "prompt": "\n\nHuman:Say hello\n\nAssistant:"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"completion":"hello"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let claude = claude_against(&server).await;
    let text = claude.call("Say hello", CallOptions::new()).await.unwrap();
    assert_eq!(text, "hello");
}

#[tokio::test]
async fn test_custom_model_id_routes_to_its_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-v2:1/invoke"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"completion":"ok"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let claude = Claude::builder("us-east-1")
        .base_url(server.uri())
        .model_id("anthropic.claude-v2:1")
        .build()
        .unwrap();

    let text = claude.call("hi", CallOptions::new()).await.unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_streaming_call_accumulates_chunks_in_order() {
    let server = MockServer::start().await;

    let mut body = String::new();
    body.push_str(&sse_chunk("a"));
    body.push_str(&sse_chunk("b"));
    // An event kind this client does not understand, interleaved mid-stream.
    body.push_str("event: internalMetrics\ndata: {\"latencyMs\":12}\n\n");
    body.push_str(&sse_chunk("c"));

    Mock::given(method("POST"))
        .and(path(
            "/model/anthropic.claude-v2/invoke-with-response-stream",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let claude = claude_against(&server).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_callback = Arc::clone(&seen);
    let options = CallOptions::new().with_streaming_func(move |bytes: &[u8]| {
        seen_by_callback
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(bytes).to_string());
        Ok(())
    });

    let generations = claude
        .generate(&["stream please".to_string()], options)
        .await
        .unwrap();

    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0].text, "abc");
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_streaming_malformed_chunk_aborts_call() {
    let server = MockServer::start().await;

    let mut body = String::new();
    body.push_str(&sse_chunk("a"));
    body.push_str(&sse_chunk("b"));
    // Valid envelope, but the inner payload is not JSON.
    let garbage = base64::engine::general_purpose::STANDARD.encode("{broken");
    body.push_str(&format!("event: chunk\ndata: {{\"bytes\":\"{garbage}\"}}\n\n"));
    body.push_str(&sse_chunk("c"));

    Mock::given(method("POST"))
        .and(path(
            "/model/anthropic.claude-v2/invoke-with-response-stream",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let claude = claude_against(&server).await;

    let calls = Arc::new(Mutex::new(0u32));
    let calls_by_callback = Arc::clone(&calls);
    let options = CallOptions::new().with_streaming_func(move |_| {
        *calls_by_callback.lock().unwrap() += 1;
        Ok(())
    });

    let result = claude.generate(&["stream".to_string()], options).await;

    assert!(matches!(result, Err(Error::Decode(_))));
    // The two chunks before the malformed one were still delivered.
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_provider_error_status_surfaces_unretried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-v2/invoke"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_raw(r#"{"message":"not authorized"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let claude = claude_against(&server).await;
    let result = claude.call("hi", CallOptions::new()).await;

    match result {
        Err(Error::Provider { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("not authorized"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-v2/invoke"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"completion":"ok"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let claude = claude_against(&server).await;
    claude.call("hi", CallOptions::new()).await.unwrap();
}

#[tokio::test]
async fn test_raw_prompt_mode_skips_framing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/anthropic.claude-v2/invoke"))
        .and(body_partial_json(serde_json::json!({ "prompt": "as-is" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"completion":"ok"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let claude = Claude::builder("us-east-1")
        .base_url(server.uri())
        .raw_prompt()
        .build()
        .unwrap();

    claude.call("as-is", CallOptions::new()).await.unwrap();
}

#[tokio::test]
async fn test_streaming_cancellation_returns_promptly() {
    let server = MockServer::start().await;

    let mut body = String::new();
    for _ in 0..50 {
        body.push_str(&sse_chunk("x"));
    }

    Mock::given(method("POST"))
        .and(path(
            "/model/anthropic.claude-v2/invoke-with-response-stream",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let claude = claude_against(&server).await;

    let token = tokio_util::sync::CancellationToken::new();
    let cancel_from_callback = token.clone();
    let calls = Arc::new(Mutex::new(0u32));
    let calls_by_callback = Arc::clone(&calls);

    let options = CallOptions::new()
        .with_cancellation_token(token)
        .with_streaming_func(move |_| {
            let mut calls = calls_by_callback.lock().unwrap();
            *calls += 1;
            if *calls == 3 {
                cancel_from_callback.cancel();
            }
            Ok(())
        });

    let result = claude.generate(&["long stream".to_string()], options).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    // Nothing fires after the cancellation point.
    assert_eq!(*calls.lock().unwrap(), 3);
}
