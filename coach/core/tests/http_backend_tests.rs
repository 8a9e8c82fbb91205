//! HTTP backend tests against a local HTTP/1.1 responder
//!
//! Each test binds a `TcpListener` on an ephemeral port, accepts a single
//! connection, captures the request and writes a canned response in as many
//! writes as the test asks for.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use coach_core::backend::{ChatRequest, CoachBackend, HttpBackend, TextOrList, TransportError};
use coach_core::config::ChatConfig;
use coach_core::{SessionOutcome, SessionPhase, StreamController};

// =============================================================================
// Test Server
// =============================================================================

/// What the client sent
#[derive(Debug)]
struct Captured {
    request_line: String,
    body: serde_json::Value,
}

enum Hold {
    /// Close after the last write
    Close,
    /// Keep the connection open until the client goes away
    UntilClientCloses,
}

fn head(status: &str, content_type: &str) -> Vec<u8> {
    format!("HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n")
        .into_bytes()
}

fn json_response(value: &serde_json::Value) -> Vec<Vec<u8>> {
    let body = value.to_string();
    vec![format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()]
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[header_end..header_end + content_length];
    Captured {
        request_line: headers.lines().next().unwrap_or_default().to_string(),
        body: if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(body).unwrap()
        },
    }
}

async fn serve_once(writes: Vec<Vec<u8>>, hold: Hold) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut socket).await;

        for write in writes {
            socket.write_all(&write).await.unwrap();
            socket.flush().await.unwrap();
            tokio::task::yield_now().await;
        }

        match hold {
            Hold::Close => {
                let _ = socket.shutdown().await;
            }
            Hold::UntilClientCloses => {
                let mut sink = [0u8; 64];
                while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
            }
        }

        captured
    });

    (base_url, handle)
}

fn backend(base_url: &str) -> HttpBackend {
    HttpBackend::new(base_url, Duration::from_secs(5), Duration::from_secs(5)).unwrap()
}

fn sse(value: &serde_json::Value) -> Vec<u8> {
    format!("data: {value}\n\n").into_bytes()
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_stream_end_to_end() {
    let mut tail = sse(&serde_json::json!({"type": "content", "content": "Bonne chance ✅"}));
    let split = tail.iter().position(|b| *b == 0xE2).unwrap() + 1;
    let rest = tail.split_off(split);

    let (base_url, server) = serve_once(
        vec![
            head("200 OK", "text/event-stream"),
            sse(&serde_json::json!({"type": "thinking", "content": "Analyzing your request..."})),
            b"data: {\"type\":\"content\",".to_vec(),
            b"\"content\":\"Practice answers. \"}\r\n\r\n".to_vec(),
            tail,
            rest,
            sse(&serde_json::json!({"type": "metadata", "action": "general_chat", "tools_used": []})),
            sse(&serde_json::json!({"type": "done"})),
        ],
        Hold::Close,
    )
    .await;

    let controller = StreamController::new(backend(&base_url), ChatConfig::default());
    let outcome = controller.send("How do I prepare?").await.unwrap();

    let turn = outcome.turn().unwrap();
    assert_eq!(turn.content, "Practice answers. Bonne chance ✅");
    assert_eq!(turn.action.as_deref(), Some("general_chat"));

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /chat/stream HTTP/1.1");
    assert_eq!(
        captured.body,
        serde_json::json!({
            "message": "How do I prepare?",
            "conversation_history": [],
            "format_preference": "markdown",
            "auto_tool_selection": true
        })
    );
}

#[tokio::test]
async fn test_stream_non_success_status() {
    let mut writes = vec![head("500 Internal Server Error", "text/plain")];
    writes.push(b"boom".to_vec());
    let (base_url, _server) = serve_once(writes, Hold::Close).await;

    let result = backend(&base_url)
        .open_stream(&ChatRequest::new("Hi"), &CancellationToken::new())
        .await;

    match result {
        Err(TransportError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        Err(e) => panic!("expected status error, got {e}"),
        Ok(_) => panic!("expected status error, got a stream"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = backend(&base_url)
        .open_stream(&ChatRequest::new("Hi"), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(TransportError::Network(_))));
}

#[tokio::test]
async fn test_cancel_while_server_holds_stream_open() {
    let (base_url, server) = serve_once(
        vec![
            head("200 OK", "text/event-stream"),
            sse(&serde_json::json!({"type": "content", "content": "Partial"})),
        ],
        Hold::UntilClientCloses,
    )
    .await;

    let controller = Arc::new(StreamController::new(backend(&base_url), ChatConfig::default()));
    let mut updates = controller.subscribe();
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.send("Hi").await })
    };

    updates
        .wait_for(|s| {
            s.phase == SessionPhase::Streaming
                && s.partial.as_ref().is_some_and(|p| p.content == "Partial")
        })
        .await
        .unwrap();
    assert!(controller.cancel());

    assert_eq!(task.await.unwrap().unwrap(), SessionOutcome::Cancelled);
    assert_eq!(controller.turns().len(), 1);

    // The response body was dropped, so the server sees the client go away
    server.await.unwrap();
}

// =============================================================================
// Non-streamed Calls
// =============================================================================

#[tokio::test]
async fn test_enhanced_chat() {
    let (base_url, server) = serve_once(
        json_response(&serde_json::json!({
            "response": "Focus on impact.",
            "action": "career_advice",
            "format": "markdown",
            "tools_used": ["career_guides"],
            "reasoning": "General career question"
        })),
        Hold::Close,
    )
    .await;

    let reply = backend(&base_url)
        .send(&ChatRequest::new("Advice?"))
        .await
        .unwrap();
    assert_eq!(reply.response, "Focus on impact.");
    assert_eq!(reply.tools_used, vec!["career_guides".to_string()]);

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /chat/enhanced HTTP/1.1");
    assert_eq!(captured.body["message"], "Advice?");
}

#[tokio::test]
async fn test_analyze_resume() {
    let (base_url, server) = serve_once(
        json_response(&serde_json::json!({
            "feedback": ["Add metrics", "Shorten summary"],
            "analysis_type": "rule_based",
            "resume_length": 42
        })),
        Hold::Close,
    )
    .await;

    let analysis = backend(&base_url)
        .analyze_resume("Jane Doe, Engineer")
        .await
        .unwrap();
    assert_eq!(
        analysis.feedback,
        TextOrList::List(vec!["Add metrics".to_string(), "Shorten summary".to_string()])
    );
    assert_eq!(analysis.analysis_type.as_deref(), Some("rule_based"));

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /tools/analyze_resume HTTP/1.1");
    assert_eq!(
        captured.body,
        serde_json::json!({"resume_text": "Jane Doe, Engineer", "use_llm": true})
    );
}

#[tokio::test]
async fn test_mock_interview() {
    let (base_url, server) = serve_once(
        json_response(&serde_json::json!({
            "questions": "1. Tell me about yourself.",
            "position": "Data Analyst",
            "generation_type": "llm_enhanced"
        })),
        Hold::Close,
    )
    .await;

    let questions = backend(&base_url)
        .mock_interview("Data Analyst")
        .await
        .unwrap();
    assert_eq!(questions.questions.to_text(), "1. Tell me about yourself.");

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /tools/mock_interview HTTP/1.1");
    assert_eq!(captured.body["position"], "Data Analyst");
}

#[tokio::test]
async fn test_featured_guides() {
    let (base_url, server) = serve_once(
        json_response(&serde_json::json!({
            "tips": ["Build a portfolio"],
            "sources": ["portfolio.md"],
            "query": "portfolio",
            "generation_type": "raw_retrieval"
        })),
        Hold::Close,
    )
    .await;

    let guides = backend(&base_url)
        .featured_guides("portfolio", 3)
        .await
        .unwrap();
    assert_eq!(guides.sources, vec!["portfolio.md".to_string()]);

    let captured = server.await.unwrap();
    assert_eq!(
        captured.request_line,
        "POST /resources/career_guides/featured HTTP/1.1"
    );
    assert_eq!(
        captured.body,
        serde_json::json!({"query": "portfolio", "top_k": 3, "use_llm": true})
    );
}

#[tokio::test]
async fn test_health() {
    let (base_url, server) = serve_once(
        json_response(&serde_json::json!({
            "status": "healthy",
            "llm_available": true,
            "version": "1.0.0"
        })),
        Hold::Close,
    )
    .await;

    let backend = backend(&base_url);
    let health = backend.health().await.unwrap();
    assert!(health.is_healthy());
    assert!(health.llm_available);

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "GET /health HTTP/1.1");
}

#[tokio::test]
async fn test_non_success_json_call_is_error() {
    let mut writes = vec![head("503 Service Unavailable", "text/plain")];
    writes.push(b"down".to_vec());
    let (base_url, _server) = serve_once(writes, Hold::Close).await;

    let err = backend(&base_url)
        .mock_interview("Engineer")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}
