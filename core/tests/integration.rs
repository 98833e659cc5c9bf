//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the real
//! `HttpTransport` and both operation clients over HTTP. The mock records
//! every request, so the tests check what went over the wire as well as
//! what came back.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mock_server::{fake_embedding, MockOllama};
use ollama_core::{
    EmbeddingClient, EmbeddingRequest, GenerationClient, GenerationOptions, GenerationRequest,
    HttpTransport, QueryParams, ServerConfig, Transport, TransportConfig, TransportErrorKind,
};
use serde_json::{json, Map, Value};

/// Start a mock on a random port and return its base URL and handle.
fn start_mock() -> (String, MockOllama) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let mock = MockOllama::new();
    let served = mock.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::serve(listener, served).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), mock)
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn post_sends_one_json_request_to_joined_url() {
    let (base_url, mock) = start_mock();
    let transport = HttpTransport::new(&format!("{base_url}/"));

    let body = json!({"model": "llama3.2", "prompt": "Hi", "stream": false});
    let response = transport.post("/api/generate", &payload(body.clone())).unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.is_successful());
    assert_eq!(response.header("content-type"), Some("application/json"));

    let recorded = mock.requests();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, "POST");
    assert_eq!(recorded[0].path, "/api/generate");
    assert_eq!(recorded[0].json(), Some(body));
    assert_eq!(recorded[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(recorded[0].accept.as_deref(), Some("application/json"));
}

#[test]
fn get_encodes_query_parameters() {
    let (base_url, mock) = start_mock();
    let transport = HttpTransport::new(&base_url);

    let mut params = QueryParams::new();
    params.insert("verbose".to_string(), true.into());
    params.insert("name".to_string(), "a b".into());
    params.insert("skip".to_string(), Option::<i64>::None.into());

    let response = transport.get("api/version", &params).unwrap();
    assert_eq!(response.json().unwrap(), payload(json!({"version": "0.0.0-mock"})));

    let recorded = mock.requests();
    assert_eq!(recorded[0].method, "GET");
    assert_eq!(recorded[0].path, "/api/version");
    assert_eq!(recorded[0].query.as_deref(), Some("name=a+b&verbose=1"));
}

#[test]
fn non_2xx_is_returned_as_a_response() {
    let (base_url, mock) = start_mock();
    mock.respond_with(404, r#"{"error":"not found"}"#);

    let response = HttpTransport::new(&base_url)
        .post("/api/generate", &payload(json!({"model": "m"})))
        .unwrap();

    assert_eq!(response.status(), 404);
    assert!(!response.is_successful());
    assert_eq!(response.body_text(), r#"{"error":"not found"}"#);
}

#[test]
fn generation_round_trip() {
    let (base_url, mock) = start_mock();
    let port = base_url.rsplit(':').next().unwrap().parse().unwrap();
    let transport = HttpTransport::for_server(&ServerConfig::new("127.0.0.1", port), TransportConfig::default());
    let client = GenerationClient::new(transport);

    let request = GenerationRequest::new("llama3.2")
        .with_prompt("Why is the sky blue?")
        .with_options(GenerationOptions::new().with_temperature(0.2).with_seed(42));
    let response = client.generate(&request).unwrap();

    assert_eq!(response.response, "Echo: Why is the sky blue?");
    assert_eq!(response.model.as_deref(), Some("llama3.2"));
    assert_eq!(response.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(response.done, Some(true));
    assert_eq!(response.context, Some(vec![1, 2, 3]));
    assert_eq!(response.prompt_eval_count, Some(5));
    assert_eq!(response.eval_count, Some(2));

    let sent = mock.requests()[0].json().unwrap();
    assert_eq!(sent["stream"], false);
    assert_eq!(sent["options"], json!({"seed": 42, "temperature": 0.2}));
}

#[test]
fn embedding_round_trip() {
    let (base_url, mock) = start_mock();
    let client = EmbeddingClient::new(HttpTransport::new(&base_url));

    let request = EmbeddingRequest::new("all-minilm", vec!["Hello", "world!"]).with_keep_alive("5m");
    let response = client.embed(&request).unwrap();

    assert_eq!(response.count(), 2);
    assert_eq!(response.dimension(), 4);
    assert_eq!(response.embeddings[0], fake_embedding("Hello"));
    assert_eq!(response.embeddings[1], fake_embedding("world!"));
    assert_eq!(response.model.as_deref(), Some("all-minilm"));
    assert_eq!(response.total_duration, Some(14_143_917));
    assert_eq!(response.load_duration, Some(1_019_500));
    assert_eq!(response.prompt_eval_count, Some(2));

    let recorded = mock.requests();
    assert_eq!(recorded[0].path, "/api/embed");
    assert_eq!(
        recorded[0].json(),
        Some(json!({"model": "all-minilm", "input": ["Hello", "world!"], "keep_alive": "5m"}))
    );
}

#[test]
fn server_rejection_becomes_generation_error() {
    let (base_url, _mock) = start_mock();
    let client = GenerationClient::new(HttpTransport::new(&base_url));

    let err = client.generate(&GenerationRequest::new("")).unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.code(), 400);
    assert!(err.message().starts_with("Generation failed with status code 400: "));
}

#[test]
fn scripted_server_error_becomes_embedding_error() {
    let (base_url, mock) = start_mock();
    mock.respond_with(500, "internal error");
    let client = EmbeddingClient::new(HttpTransport::new(&base_url));

    let err = client.embed(&EmbeddingRequest::new("m", "x")).unwrap_err();
    assert_eq!(err.to_string(), "Embedding generation failed with status code 500: internal error");
    assert_eq!(err.status(), Some(500));
}

#[test]
fn malformed_body_becomes_unexpected_error() {
    let (base_url, mock) = start_mock();
    mock.respond_with(200, "{invalid json}");
    let client = GenerationClient::new(HttpTransport::new(&base_url));

    let err = client.generate(&GenerationRequest::new("m").with_prompt("p")).unwrap_err();
    assert!(err
        .message()
        .starts_with("Unexpected error during text generation: Failed to decode JSON response"));
    assert_eq!(err.code(), 0);
}

#[test]
fn slow_server_trips_total_timeout() {
    let (base_url, mock) = start_mock();
    mock.delay_responses(Duration::from_secs(5));
    let config = TransportConfig::default().with_timeout(Duration::from_millis(200));
    let client = GenerationClient::new(HttpTransport::with_config(&base_url, config));

    let err = client.generate(&GenerationRequest::new("m").with_prompt("p")).unwrap_err();
    assert!(err.message().starts_with("Transport error during text generation: "));
    assert!(err.is_transport());
    assert_eq!(err.code(), TransportErrorKind::Timeout.code());
    assert_eq!(err.status(), None);
}

#[test]
fn refused_connection_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = EmbeddingClient::new(HttpTransport::new(&format!("http://{addr}")));
    let err = client.embed(&EmbeddingRequest::new("m", "x")).unwrap_err();

    assert!(err.message().starts_with("Transport error during embedding generation: "));
    assert!(err.is_transport());
    assert_ne!(err.code(), 0);
}

#[test]
fn custom_header_reaches_the_server() {
    let (base_url, mock) = start_mock();
    let config = TransportConfig::default().with_header("accept", "application/x-ndjson");
    let transport = HttpTransport::with_config(&base_url, config);

    transport.post("/api/embed", &payload(json!({"model": "m", "input": "x"}))).unwrap();
    assert_eq!(mock.requests()[0].accept.as_deref(), Some("application/x-ndjson"));
}

/// Serve raw HTTP: the first request gets a 302 to `/elsewhere`, later ones
/// a generation reply. Returns the base URL and the request lines seen.
fn start_redirecting_server() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim().is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();

            let first = {
                let mut log = log.lock().unwrap();
                log.push(request_line.trim().to_string());
                log.len() == 1
            };
            let reply = if first {
                "HTTP/1.1 302 Found\r\nLocation: /elsewhere\r\nContent-Length: 5\r\nConnection: close\r\n\r\nmoved"
                    .to_string()
            } else {
                let body = r#"{"response":"from redirect target"}"#;
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
            };
            stream.write_all(reply.as_bytes()).unwrap();
        }
    });

    (format!("http://{addr}"), seen)
}

#[test]
fn redirect_is_returned_without_following_it() {
    let (base_url, seen) = start_redirecting_server();
    let response = HttpTransport::new(&base_url)
        .post("/api/generate", &payload(json!({"model": "m", "prompt": "p"})))
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(response.header("location"), Some("/elsewhere"));
    assert_eq!(response.body_text(), "moved");
    assert_eq!(*seen.lock().unwrap(), vec!["POST /api/generate HTTP/1.1".to_string()]);
}

#[test]
fn redirect_becomes_generation_status_error() {
    let (base_url, seen) = start_redirecting_server();
    let client = GenerationClient::new(HttpTransport::new(&base_url));

    let err = client.generate(&GenerationRequest::new("m").with_prompt("p")).unwrap_err();
    assert_eq!(err.to_string(), "Generation failed with status code 302: moved");
    assert_eq!(err.status(), Some(302));
    assert_eq!(err.code(), 302);
    assert_eq!(seen.lock().unwrap().len(), 1);
}
