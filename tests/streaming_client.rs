use std::time::Duration;

use futures::StreamExt;
use llm_stream_client::{
    stream_completion, summarize, ChatRequest, EndpointConfig, StreamError,
    StreamingCompletionClient,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(deltas: &[&str], done: bool) -> String {
    let mut body = String::new();

    for delta in deltas {
        let event = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "model": "test",
            "choices": [{ "index": 0, "delta": { "content": delta }, "finish_reason": null }]
        });
        body.push_str(&format!("data: {}\n\n", event));
    }

    if done {
        body.push_str("data: [DONE]\n\n");
    }

    body
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn endpoint_for(server: &MockServer) -> EndpointConfig {
    EndpointConfig::new(format!("{}/", server.uri()), "ollama", "test")
}

fn say_this_is_a_test() -> ChatRequest {
    ChatRequest::builder().user("Say this is a test").build()
}

#[tokio::test]
async fn streams_chunks_in_order_and_terminates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer ollama"))
        .and(body_partial_json(serde_json::json!({
            "model": "test",
            "stream": true,
            "messages": [{ "role": "user", "content": "Say this is a test" }]
        })))
        .respond_with(event_stream(sse_body(&["This", " is", " a", " test"], true)))
        .expect(1)
        .mount(&server)
        .await;

    let mut stream = stream_completion(&endpoint_for(&server), say_this_is_a_test())
        .await
        .unwrap();

    let mut deltas = Vec::new();
    while let Some(chunk) = stream.next().await {
        deltas.push(chunk.unwrap().delta().unwrap_or_default().to_string());
    }

    assert_eq!(deltas, vec!["This", " is", " a", " test"]);
    assert_eq!(stream.chunks_received(), 4);
}

#[tokio::test]
async fn summarizes_a_full_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(event_stream(sse_body(&["Hello", ", world"], true)))
        .mount(&server)
        .await;

    let stream = stream_completion(&endpoint_for(&server), say_this_is_a_test())
        .await
        .unwrap();
    let summary = summarize(stream).await.unwrap();

    assert_eq!(summary.text(), "Hello, world");
    assert_eq!(summary.chunks(), 2);
}

#[tokio::test]
async fn unauthorized_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = stream_completion(&endpoint_for(&server), say_this_is_a_test())
        .await
        .unwrap_err();

    assert!(err.is_protocol());
    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("invalid api key"));
}

#[tokio::test]
async fn json_body_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{ "message": { "role": "assistant", "content": "not streamed" } }]
        })))
        .mount(&server)
        .await;

    let err = stream_completion(&endpoint_for(&server), say_this_is_a_test())
        .await
        .unwrap_err();

    assert!(err.is_protocol());
}

#[tokio::test]
async fn missing_done_marker_reports_interruption() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(event_stream(sse_body(&["one", "two", "three"], false)))
        .mount(&server)
        .await;

    let mut stream = stream_completion(&endpoint_for(&server), say_this_is_a_test())
        .await
        .unwrap();

    let mut received = 0;
    let error = loop {
        match stream.next().await {
            Some(Ok(_)) => received += 1,
            Some(Err(e)) => break Some(e),
            None => break None,
        }
    };

    assert_eq!(received, 3);
    match error {
        Some(StreamError::StreamInterrupted {
            chunks_received, ..
        }) => assert_eq!(chunks_received, 3),
        other => panic!("expected interruption, got {:?}", other),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn abandoning_the_stream_raises_no_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(event_stream(sse_body(&["a", "b", "c", "d"], true)))
        .mount(&server)
        .await;

    let stream = stream_completion(&endpoint_for(&server), say_this_is_a_test())
        .await
        .unwrap();

    let first_two: Vec<_> = stream.take(2).collect().await;

    assert_eq!(first_two.len(), 2);
    assert!(first_two.iter().all(Result::is_ok));
}

/// Read one HTTP request (headers plus Content-Length body) off the socket
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        request.extend_from_slice(&buf[..n]);

        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|value| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);

    while request.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed mid-request");
        request.extend_from_slice(&buf[..n]);
    }
}

#[tokio::test]
async fn dropping_the_stream_closes_the_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let event = sse_body(&["first"], false);
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            event.len(),
            event
        );
        socket.write_all(response.as_bytes()).await.unwrap();

        // The response stays open; only the client can end this read
        let mut buf = [0u8; 1024];
        tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await
    });

    let endpoint = EndpointConfig::new(format!("http://{}/", addr), "ollama", "test");
    let mut stream = stream_completion(&endpoint, say_this_is_a_test())
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.delta(), Some("first"));
    assert!(!stream.is_terminated());

    drop(stream);

    match server.await.unwrap() {
        Ok(Ok(0)) | Ok(Err(_)) => {}
        Ok(Ok(n)) => panic!("server read {} unexpected bytes instead of EOF", n),
        Err(_) => panic!("connection still open after the stream was dropped"),
    }
}

#[tokio::test]
async fn empty_request_never_reaches_the_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(event_stream(sse_body(&[], true)))
        .expect(0)
        .mount(&server)
        .await;

    let err = stream_completion(&endpoint_for(&server), ChatRequest::new(vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::Validation { .. }));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connection_error() {
    // Grab a free port, then release it so nothing is listening there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let endpoint = EndpointConfig::new(format!("http://127.0.0.1:{}/", port), "ollama", "test");

    let err = stream_completion(&endpoint, say_this_is_a_test())
        .await
        .unwrap_err();

    assert!(err.is_connection(), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn client_from_config_uses_base_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(event_stream(sse_body(&["ok"], true)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = llm_stream_client::AppConfig::default();
    config.endpoint = EndpointConfig::new(format!("{}/openai/v1", server.uri()), "gsk", "test");

    let client = StreamingCompletionClient::from_config(&config).unwrap();
    let summary = summarize(client.stream_completion(say_this_is_a_test()).await.unwrap())
        .await
        .unwrap();

    assert_eq!(summary.text(), "ok");
}
