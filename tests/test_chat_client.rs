//! End-to-end tests for the streaming chat client against a local HTTP server
//! that writes a chunked `text/plain` body.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use answer_stream::chat::client::{ChatClient, StreamError};
use answer_stream::chat::Conversation;
use answer_stream::config::ApiConfig;
use answer_stream::{AnswerParser, Citation, ParsedAnswer};

const FALLBACK: &str = "No answer found.";

enum Reply {
    Chunked(Vec<Vec<u8>>),
    Status(&'static str, &'static str),
}

/// Accept one connection, answer it, and return the raw request.
async fn serve_once(reply: Reply) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        match reply {
            Reply::Chunked(chunks) => {
                stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\n\
                          Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
                for chunk in chunks {
                    stream.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await.unwrap();
                    stream.write_all(&chunk).await.unwrap();
                    stream.write_all(b"\r\n").await.unwrap();
                    stream.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(15)).await;
                }
                stream.write_all(b"0\r\n\r\n").await.unwrap();
            }
            Reply::Status(status, body) => {
                let resp = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(resp.as_bytes()).await.unwrap();
            }
        }
        stream.shutdown().await.ok();
        request
    });

    (base_url, handle)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = stream.read(&mut tmp).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8(buf).unwrap()
}

fn request_body(request: &str) -> serde_json::Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

fn client(base_url: &str) -> ChatClient {
    let api = ApiConfig { base_url: base_url.to_string(), timeout_seconds: 5 };
    ChatClient::new(&api, AnswerParser::default(), FALLBACK).unwrap()
}

fn chunks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

#[tokio::test]
async fn streams_answer_and_records_exchange() {
    let raw = [
        "The warranty lasts two ye",
        "ars. See [Warr",
        "anty](http://d/w). <<How do I cl",
        "aim?>>",
        "separator[Warranty terms](http://d/w)[FAQ (2024)](http://d/f",
        "aq)",
    ];
    let (base_url, server) = serve_once(Reply::Chunked(chunks(&raw))).await;
    let client = client(&base_url);
    let mut conversation = Conversation::default();

    let mut partials: Vec<ParsedAnswer> = Vec::new();
    let parsed = client
        .ask(&mut conversation, "How long is the warranty?", |p| partials.push(p.clone()))
        .await
        .unwrap();

    assert_eq!(
        parsed.display_text.trim_end(),
        "The warranty lasts two years. See [Warranty](http://d/w)."
    );
    assert_eq!(
        parsed.citations,
        vec![
            Citation { title: "Warranty terms".into(), url: "http://d/w".into() },
            Citation { title: "FAQ (2024)".into(), url: "http://d/faq".into() },
        ]
    );
    assert_eq!(parsed.followup_questions, vec!["How do I claim?"]);

    assert!(!partials.is_empty());
    for p in &partials {
        assert!(!p.display_text.ends_with("[Warr"), "open citation flashed");
        assert!(parsed.citations.starts_with(&p.citations));
        assert!(parsed.followup_questions.starts_with(&p.followup_questions));
    }

    assert_eq!(conversation.exchanges().len(), 1);
    assert_eq!(conversation.last_question(), Some("How long is the warranty?"));
    assert_eq!(conversation.exchanges()[0].response, raw.concat());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/chat_stream "));
    assert!(request.to_lowercase().contains("accept: text/plain"));
    let body = request_body(&request);
    assert_eq!(body["question"], "How long is the warranty?");
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn sends_recent_history() {
    let (base_url, server) = serve_once(Reply::Chunked(chunks(&["Yes."]))).await;
    let client = client(&base_url);
    let mut conversation = Conversation::new(1);
    conversation.record("first?", "one");
    conversation.record("second?", "two");

    client.ask(&mut conversation, "third?", |_| {}).await.unwrap();

    let body = request_body(&server.await.unwrap());
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "second?");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "two");
    assert_eq!(conversation.exchanges().len(), 1);
    assert_eq!(conversation.last_question(), Some("third?"));
}

#[tokio::test]
async fn empty_stream_uses_fallback() {
    let (base_url, server) = serve_once(Reply::Chunked(Vec::new())).await;
    let client = client(&base_url);
    let mut conversation = Conversation::default();

    let parsed = client.ask(&mut conversation, "anything?", |_| {}).await.unwrap();

    assert_eq!(parsed.display_text, FALLBACK);
    assert!(parsed.citations.is_empty());
    assert_eq!(conversation.exchanges()[0].response, FALLBACK);
    server.await.unwrap();
}

#[tokio::test]
async fn multibyte_char_split_across_chunks() {
    let text = "Svaret står i håndboka.";
    let bytes = text.as_bytes();
    let split = text.find('å').unwrap() + 1;
    let reply = Reply::Chunked(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]);
    let (base_url, server) = serve_once(reply).await;
    let client = client(&base_url);
    let mut conversation = Conversation::default();

    let mut partials = Vec::new();
    let parsed = client
        .ask(&mut conversation, "hvor?", |p| partials.push(p.display_text.clone()))
        .await
        .unwrap();

    assert_eq!(parsed.display_text, text);
    assert!(partials.iter().all(|p| !p.contains('\u{FFFD}')));
    server.await.unwrap();
}

#[tokio::test]
async fn http_error_is_reported_and_not_recorded() {
    let (base_url, server) =
        serve_once(Reply::Status("500 Internal Server Error", "index unavailable")).await;
    let client = client(&base_url);
    let mut conversation = Conversation::default();

    let err = client.ask(&mut conversation, "why?", |_| {}).await.unwrap_err();
    match err {
        StreamError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "index unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(conversation.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}/api"));
    let mut conversation = Conversation::default();
    let err = client.ask(&mut conversation, "hello?", |_| {}).await.unwrap_err();
    assert!(matches!(err, StreamError::Request(_)));
}
