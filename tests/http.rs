use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use custombet_terminal::config::{Locale, PredictionConfig, PredictionVariant};
use custombet_terminal::error::PredictionError;
use custombet_terminal::gemini::{GeminiClient, PredictionSource};
use custombet_terminal::state::{Outcome, Pick};

const MODEL: &str = "gemini-test-model";
const KEY: &str = "test-key";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn client_for(addr: SocketAddr, timeout: Duration) -> GeminiClient {
    let config = PredictionConfig {
        api_key: Some(KEY.to_string()),
        api_base: format!("http://{addr}"),
        model: MODEL.to_string(),
        variant: PredictionVariant::Outcome,
        locale: Locale::En,
        timeout,
        ..PredictionConfig::default()
    };
    GeminiClient::new(config).expect("client builds")
}

/// Reads one HTTP request (head plus `content-length` body) and returns it.
fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let body_len = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serves a single canned response and hands back the request it saw.
fn serve_once(status_line: &'static str, body: String) -> (SocketAddr, Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::channel();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();
        let _ = seen_tx.send(request);
    });
    (addr, seen_rx)
}

/// Accepts the connection, reads the request and never answers.
fn serve_silence(hold: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let _ = read_request(&mut stream);
        thread::sleep(hold);
    });
    addr
}

#[test]
fn silent_provider_times_out() {
    let addr = serve_silence(Duration::from_secs(6));
    let client = client_for(addr, Duration::from_secs(1));
    assert_eq!(client.fetch(day()), Err(PredictionError::Timeout));
}

#[test]
fn rejected_key_is_credential_invalid_and_request_is_well_formed() {
    let (addr, seen) = serve_once("400 Bad Request", read_fixture("error_api_key.json"));
    let client = client_for(addr, Duration::from_secs(5));

    assert_eq!(client.fetch(day()), Err(PredictionError::CredentialInvalid));

    let request = seen
        .recv_timeout(Duration::from_secs(5))
        .expect("stub saw a request");
    let request_line = request.lines().next().unwrap_or_default();
    assert_eq!(
        request_line,
        format!("POST /models/{MODEL}:generateContent HTTP/1.1")
    );
    let has_key = request
        .lines()
        .filter_map(|line| line.split_once(':'))
        .any(|(name, value)| name.eq_ignore_ascii_case("x-goog-api-key") && value.trim() == KEY);
    assert!(has_key, "missing key header in:\n{request}");
    assert!(request.contains("google_search"));
    assert!(request.contains("2026-10-19"));
}

#[test]
fn server_error_without_key_text_is_unknown() {
    let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
    let (addr, _seen) = serve_once("503 Service Unavailable", body.to_string());
    let client = client_for(addr, Duration::from_secs(5));
    assert_eq!(
        client.fetch(day()),
        Err(PredictionError::Unknown(
            "UNAVAILABLE: The model is overloaded.".to_string()
        ))
    );
}

#[test]
fn successful_answer_is_parsed_into_a_batch() {
    let (addr, _seen) = serve_once("200 OK", read_fixture("generate_outcome.json"));
    let client = client_for(addr, Duration::from_secs(5));

    let batch = client.fetch(day()).expect("fixture answer parses");
    let outcomes: Vec<Outcome> = batch
        .matches
        .iter()
        .map(|m| match &m.pick {
            Pick::Outcome { outcome, .. } => *outcome,
            Pick::CustomBet { .. } => panic!("unexpected custom bet"),
        })
        .collect();
    assert_eq!(
        outcomes,
        vec![Outcome::HomeWin, Outcome::Draw, Outcome::AwayWin]
    );
}

#[test]
fn empty_success_body_is_empty_response() {
    let (addr, _seen) = serve_once("200 OK", String::new());
    let client = client_for(addr, Duration::from_secs(5));
    assert_eq!(client.fetch(day()), Err(PredictionError::EmptyResponse));
}
