//! End-to-end tests through reqwest against a wiremock server.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use openai_kit_core::{
    HttpMethod, ReqwestTransport, RequestError, RequestExecutor, RequestSpec, ResponseStream,
    StreamRegistry,
};
use reqwest::StatusCode;
use serde::Deserialize;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    text: String,
}

fn sse(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{line}\n\n")).collect()
}

#[tokio::test]
async fn test_executor_decodes_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"text": "ping"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "pong"})))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(reqwest::Client::new()).with_timeout(Duration::from_secs(5));
    let spec = RequestSpec::post_json(
        format!("{}/v1/echo", server.uri()),
        &serde_json::json!({"text": "ping"}),
    )
    .expect("serializable body");

    let echo: Echo = executor.send(&spec).await.expect("request succeeds");
    assert_eq!(echo.text, "pong");
}

#[tokio::test]
async fn test_executor_reports_status_with_decoded_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(reqwest::Client::new());
    let spec = RequestSpec::new(HttpMethod::Post, format!("{}/v1/echo", server.uri()));

    let err = executor.send::<Echo>(&spec).await.expect_err("401 is an error");
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(err.message().as_deref(), Some("Incorrect API key provided"));
}

#[tokio::test]
async fn test_executor_rejects_invalid_url() {
    let executor = RequestExecutor::new(reqwest::Client::new());
    let spec = RequestSpec::new(HttpMethod::Post, "not a url");

    let err = executor.send::<Echo>(&spec).await.expect_err("invalid URL");
    assert!(matches!(err, RequestError::InvalidUrl { .. }));
}

#[tokio::test]
async fn test_executor_rejects_empty_and_malformed_bodies() {
    let server = MockServer::start().await;
    Mock::given(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\":true}"))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(reqwest::Client::new());

    let empty = RequestSpec::new(HttpMethod::Get, format!("{}/empty", server.uri()));
    assert!(matches!(
        executor.send::<Echo>(&empty).await,
        Err(RequestError::InvalidResponseShape(_))
    ));

    let garbage = RequestSpec::new(HttpMethod::Get, format!("{}/garbage", server.uri()));
    assert!(matches!(
        executor.send::<Echo>(&garbage).await,
        Err(RequestError::Decode(_))
    ));
}

#[tokio::test]
async fn test_response_stream_over_reqwest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[
                r#"data: {"text":"one"}"#,
                ": keep-alive",
                r#"data: {"text":"two"}"#,
                "data: [DONE]",
            ]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
    let registry = StreamRegistry::new();
    let spec = RequestSpec::new(HttpMethod::Post, format!("{}/v1/stream", server.uri()))
        .with_header("Accept", "text/event-stream");

    let stream = ResponseStream::<Echo>::start(spec, transport, Some(&registry));
    let items: Vec<_> = tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
        .await
        .expect("stream ends");

    let items: Vec<_> = items
        .into_iter()
        .map(|item| item.expect("no stream error"))
        .collect();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].message, Some(Echo { text: "one".into() }));
    assert_eq!(items[1].message, Some(Echo { text: "two".into() }));
    assert!(items[2].message.is_none());
    assert_eq!(items[2].data.as_deref(), Some(b"data: [DONE]".as_slice()));
    assert!(items[3].is_finished);
    assert!(!items[3].force_end);
}

#[tokio::test]
async fn test_response_stream_surfaces_in_band_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "bad request"}
        })))
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
    let spec = RequestSpec::new(HttpMethod::Post, format!("{}/v1/stream", server.uri()));

    let mut stream = ResponseStream::<Echo>::start(spec, transport, None);
    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("item arrives")
        .expect("stream yields");

    let err = first.expect_err("error is terminal");
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.message().as_deref(), Some("bad request"));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_connection_failure_is_reported() {
    let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
    // Port 9 on localhost is discard; nothing should be listening in CI
    let spec = RequestSpec::new(HttpMethod::Post, "http://127.0.0.1:9/v1/stream");

    let mut stream = ResponseStream::<Echo>::start(spec, transport, None);
    let first = tokio::time::timeout(Duration::from_secs(10), stream.next())
        .await
        .expect("item arrives")
        .expect("stream yields");

    assert!(matches!(first, Err(RequestError::Transport(_))));
}

#[tokio::test]
async fn test_dropping_response_stream_cancels_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse(&[r#"data: {"text":"slow"}"#]), "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
    let registry = StreamRegistry::new();
    let spec = RequestSpec::new(HttpMethod::Post, format!("{}/v1/stream", server.uri()));

    let stream = ResponseStream::<Echo>::start(spec, transport, Some(&registry));
    let handle = stream.handle().clone();
    assert!(registry.contains(handle.id()));

    drop(stream);
    assert!(handle.is_terminal());

    for _ in 0..200 {
        if registry.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(registry.is_empty());
}
