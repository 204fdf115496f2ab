use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use dqa_ai::completion::complete;
use dqa_ai::config::CompletionConfig;
use dqa_ai::llm::openai_llm::OpenAiLlm;
use dqa_ai::llm::Llm;
use dqa_core::error::AppError;
use pretty_assertions::assert_eq;

const KEY_ENV: &str = "DQA_OPENAI_LLM_TEST_KEY";
const PROMPT: &str = "PROMPT BODY: What were Scope 1 emissions?";

/// Serve one canned HTTP response on a loopback port. The handle yields the request body.
fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        String::from_utf8(request_body).unwrap()
    });
    (format!("http://{addr}/v1"), handle)
}

fn llm_for(base_url: String) -> OpenAiLlm {
    std::env::set_var(KEY_ENV, "sk-test");
    OpenAiLlm::new(CompletionConfig {
        base_url,
        api_key_env: KEY_ENV.to_string(),
        timeout_secs: 5,
        ..CompletionConfig::default()
    })
}

fn failure_for(status_line: &str, body: &str) -> AppError {
    let (url, server) = serve_once(status_line, body);
    let err = llm_for(url).generate(PROMPT).unwrap_err();
    server.join().unwrap();
    assert!(!err.is_config_error());
    err
}

fn assert_diagnostic(status_line: &str, body: &str, code: &str) {
    let (url, server) = serve_once(status_line, body);
    let answer = complete(&llm_for(url), PROMPT).unwrap();
    server.join().unwrap();
    assert!(answer.starts_with(&format!("LLM CALL FAILED: {code}: ")));
    assert!(answer.ends_with(&format!("\n\n--- PROMPT PREVIEW ---\n\n{PROMPT}")));
}

#[test]
fn successful_completion_returns_message_content() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"Scope 1 was 116,092 tCO2e [chunk_id=0]."}}]}"#,
    );
    let out = llm_for(url).generate(PROMPT).unwrap();
    assert_eq!(out, "Scope 1 was 116,092 tCO2e [chunk_id=0].");

    let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
    assert_eq!(sent["model"], "gpt-4.1-mini");
    assert_eq!(sent["max_tokens"], 500);
    assert_eq!(sent["messages"][0]["role"], "user");
    assert_eq!(sent["messages"][0]["content"], PROMPT);
}

#[test]
fn rate_limit_is_a_retryable_completion_failure() {
    let err = failure_for("429 Too Many Requests", r#"{"error":"quota exceeded"}"#);
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
    assert!(err.retryable);
    let details = err.details.unwrap();
    assert!(details.contains("status=429"));
    assert!(details.contains("quota exceeded"));

    assert_diagnostic("429 Too Many Requests", r#"{"error":"quota exceeded"}"#, "AI_COMPLETION_FAILED");
}

#[test]
fn client_error_status_is_not_retryable() {
    let err = failure_for("400 Bad Request", r#"{"error":"unknown model"}"#);
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
    assert!(!err.retryable);
}

#[test]
fn undecodable_body_is_a_completion_failure() {
    let err = failure_for("200 OK", "<html>gateway</html>");
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
    assert_eq!(err.message, "Failed to decode completion response");

    assert_diagnostic("200 OK", "<html>gateway</html>", "AI_COMPLETION_FAILED");
}

#[test]
fn missing_or_null_content_is_an_empty_completion() {
    for body in [
        r#"{"choices":[]}"#,
        r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#,
    ] {
        let err = failure_for("200 OK", body);
        assert_eq!(err.code, "AI_COMPLETION_EMPTY");
    }

    assert_diagnostic("200 OK", r#"{"choices":[]}"#, "AI_COMPLETION_EMPTY");
}
