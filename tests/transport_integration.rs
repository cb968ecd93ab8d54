/// Integration tests for the reqwest-backed transport.
///
/// Each test starts a one-shot HTTP stub on a loopback port, so no Ollama
/// instance is needed.
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{Value, json};
use tinychain::ollama::request;
use tinychain::{ChatClient, Message, OllamaClient, OllamaClientBuilder, OllamaError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A request as seen by the stub server.
struct CapturedRequest {
    head: String,
    body: String,
}

impl CapturedRequest {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body should be JSON")
    }
}

struct StubServer {
    url: String,
    handle: JoinHandle<CapturedRequest>,
}

impl StubServer {
    /// Serves exactly one request with the given status line and body.
    fn respond(status_line: &'static str, body: &'static str) -> Self {
        Self::spawn(move |stream| {
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .expect("failed to write response");
            stream.flush().expect("failed to flush response");
        })
    }

    /// Reads one request and then stalls without answering.
    fn stall(for_duration: Duration) -> Self {
        Self::spawn(move |_| thread::sleep(for_duration))
    }

    fn spawn(reply: impl FnOnce(&mut TcpStream) + Send + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind stub server");
        let addr = listener.local_addr().expect("stub server has no address");

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("failed to accept connection");
            let captured = read_request(&mut stream);
            reply(&mut stream);
            captured
        });

        Self {
            url: format!("http://{addr}/api/chat"),
            handle,
        }
    }

    fn client(&self) -> OllamaClient {
        OllamaClientBuilder::new()
            .model("llama3.2")
            .endpoint(&self.url)
            .build()
            .expect("Failed to create client")
    }

    fn captured(self) -> CapturedRequest {
        self.handle.join().expect("stub server panicked")
    }
}

fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = stream.read(&mut buf).expect("failed to read request");
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        if let Some(end) = find_header_end(&data) {
            let head = String::from_utf8_lossy(&data[..end]).to_string();
            if data.len() >= end + 4 + content_length(&head) {
                break;
            }
        }
    }

    let end = find_header_end(&data).expect("incomplete request head");
    CapturedRequest {
        head: String::from_utf8_lossy(&data[..end]).to_string(),
        body: String::from_utf8_lossy(&data[end + 4..]).to_string(),
    }
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn question() -> Vec<Message> {
    vec![
        Message::system("Answer in one sentence."),
        Message::user("Why is the sky blue?"),
    ]
}

#[test]
fn chat_round_trip_returns_parsed_body() -> anyhow::Result<()> {
    init_tracing();
    let server = StubServer::respond(
        "200 OK",
        r#"{"model":"llama3.2","message":{"role":"assistant","content":"Rayleigh scattering."},"done":true}"#,
    );

    let response = server.client().chat(&question())?;

    assert_eq!(response["message"]["content"], "Rayleigh scattering.");
    assert_eq!(response["done"], true);

    let captured = server.captured();
    assert!(captured.head.starts_with("POST /api/chat HTTP/1.1"));
    assert_eq!(
        captured.json(),
        request::build_base_request("llama3.2", &question())
    );
    Ok(())
}

#[test]
fn request_is_sent_as_json() {
    init_tracing();
    let server = StubServer::respond("200 OK", "{}");

    server.client().chat(&question()).expect("chat should succeed");

    let head = server.captured().head.to_ascii_lowercase();
    assert!(
        head.contains("content-type: application/json"),
        "missing JSON content type in:\n{head}"
    );
}

#[test]
fn non_json_body_is_parse_error_with_raw_text() {
    init_tracing();
    let server = StubServer::respond("200 OK", "not json");

    let err = server.client().chat(&question()).unwrap_err();

    match &err {
        OllamaError::Parse { raw, .. } => assert_eq!(raw, "not json"),
        other => panic!("Expected Parse error, got: {other}"),
    }
    assert!(err.to_string().contains("Raw response: not json"));
    server.captured();
}

#[test]
fn error_status_with_json_body_is_returned_unchanged() {
    init_tracing();
    let server = StubServer::respond("404 Not Found", r#"{"error":"model 'llama3.2' not found"}"#);

    let response = server
        .client()
        .chat(&question())
        .expect("JSON error bodies are returned as responses");

    assert_eq!(response, json!({"error": "model 'llama3.2' not found"}));
    server.captured();
}

#[test]
fn refused_connection_is_transport_error() {
    init_tracing();
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        listener.local_addr().expect("no local address")
    };

    let client = OllamaClientBuilder::new()
        .model("llama3.2")
        .endpoint(format!("http://{addr}/api/chat"))
        .build()
        .expect("Failed to create client");

    let err = client.chat(&question()).unwrap_err();
    assert!(
        matches!(err, OllamaError::Transport(_)),
        "Expected Transport error, got: {err}"
    );
}

#[test]
fn configured_timeout_surfaces_as_transport_error() {
    init_tracing();
    let server = StubServer::stall(Duration::from_secs(2));

    let client = OllamaClientBuilder::new()
        .model("llama3.2")
        .endpoint(&server.url)
        .timeout(Duration::from_millis(200))
        .build()
        .expect("Failed to create client");

    let err = client.chat(&question()).unwrap_err();
    assert!(
        matches!(err, OllamaError::Transport(_)),
        "Expected Transport error, got: {err}"
    );
    server.captured();
}

#[test]
fn dispatch_with_tools_context_sends_tools() -> anyhow::Result<()> {
    init_tracing();
    let server = StubServer::respond("200 OK", r#"{"message":{"tool_calls":[]}}"#);
    let tools = json!([{
        "type": "function",
        "function": {
            "name": "get_current_weather",
            "description": "Get the current weather for a location",
            "parameters": {
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }
        }
    }]);
    let context = json!({"tools": tools.clone()});
    let messages = vec![Message::new("user", "What is the weather in Paris today?")?];

    server.client().dispatch(&messages, Some(&context))?;

    let sent = server.captured().json();
    assert_eq!(sent["tools"], tools);
    assert!(sent.get("format").is_none());
    assert_eq!(sent["stream"], false);
    Ok(())
}

#[test]
fn dispatch_with_output_format_context_sends_format() -> anyhow::Result<()> {
    init_tracing();
    let server = StubServer::respond(
        "200 OK",
        r#"{"message":{"role":"assistant","content":"{\"age\":22,\"available\":false}"}}"#,
    );
    let schema = json!({
        "type": "object",
        "properties": {
            "age": {"type": "integer"},
            "available": {"type": "boolean"}
        },
        "required": ["age", "available"]
    });
    let context = json!({"outputFormat": schema.clone()});

    let response = server.client().dispatch(&question(), Some(&context))?;

    let content: Value = serde_json::from_str(response["message"]["content"].as_str().unwrap())?;
    assert_eq!(content, json!({"age": 22, "available": false}));

    let sent = server.captured().json();
    assert_eq!(sent["format"], json!({"type": "json", "schema": schema}));
    assert_eq!(sent["options"]["temperature"].as_f64(), Some(0.0));
    assert!(sent.get("tools").is_none());
    assert!(sent.get("outputFormat").is_none());
    Ok(())
}

#[test]
fn dispatch_with_unusable_context_sends_plain_request() -> anyhow::Result<()> {
    init_tracing();
    let server = StubServer::respond("200 OK", "{}");

    server
        .client()
        .dispatch(&question(), Some(&json!({"tools": "not-an-array"})))?;

    assert_eq!(
        server.captured().json(),
        request::build_base_request("llama3.2", &question())
    );
    Ok(())
}
