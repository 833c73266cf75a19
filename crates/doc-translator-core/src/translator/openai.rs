use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TranslatorConfig;
use crate::error::{Error, Result};
use super::traits::{Translator, TranslatorInfo};

const SYSTEM_PROMPT: &str = "You are a translation assistant.";

/// OpenAI-compatible chat-completion translator.
/// Works with: AkashML, DeepSeek, Hyperbolic, OpenAI, llama.cpp server, etc.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "https://api.deepseek.com")
    api_base: String,
    api_key: String,
    /// Model identifier
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiTranslator {
    /// Create a translator; `timeout` bounds each request end to end.
    pub fn new(config: &TranslatorConfig, timeout: Duration) -> Result<Self> {
        let api_key = config
            .api_key()
            .ok_or(Error::TranslationMissingApiKey)?
            .to_string();

        if config.api_base.trim().is_empty() {
            return Err(Error::ConfigMissing("translator.api_base".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::invalid("translator", format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    /// Create translation prompt
    fn create_prompt(text: &str) -> String {
        format!("将该文本翻译成中文: {text}")
    }

    /// Pull the translated text out of a response body.
    fn parse_response(body: &str) -> Result<String> {
        let response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| Error::TranslationInvalidResponse(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::TranslationInvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(Error::TranslationInvalidResponse("Empty content in response".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            model: self.model.clone(),
        }
    }

    async fn translate(&self, text: &str) -> Result<String> {
        let url = self.endpoint();
        let prompt = Self::create_prompt(text);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message { role: "system", content: SYSTEM_PROMPT },
                Message { role: "user", content: &prompt },
            ],
            stream: false,
        };

        debug!("POST {} ({} chars)", url, text.chars().count());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::TranslationTimeout
                } else {
                    Error::TranslationRequest(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!("Rate limited, retry after {:?}s", retry_after);
            return Err(Error::TranslationRateLimited { retry_after });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::TranslationTimeout
            } else {
                Error::TranslationRequest(e.to_string())
            }
        })?;

        if !status.is_success() {
            warn!("API error: {} - {}", status, body);
            return Err(Error::TranslationRequest(format!("HTTP {status}: {body}")));
        }

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(base: &str) -> TranslatorConfig {
        TranslatorConfig::new(base, Some("test-key".to_string()), "test-model")
    }

    /// Serve exactly one HTTP response, returning the base URL.
    async fn serve_once(status: &'static str, extra_headers: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/v1")
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let cfg = TranslatorConfig::new("http://localhost:8080/v1", None, "m");
        let err = OpenAiTranslator::new(&cfg, Duration::from_secs(5)).err().unwrap();
        assert!(matches!(err, Error::TranslationMissingApiKey));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let t = OpenAiTranslator::new(&config("http://host/v1/"), Duration::from_secs(5)).unwrap();
        assert_eq!(t.endpoint(), "http://host/v1/chat/completions");
    }

    #[test]
    fn test_prompt_asks_for_chinese() {
        assert_eq!(OpenAiTranslator::create_prompt("Hello"), "将该文本翻译成中文: Hello");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"你好"}}]}"#;
        assert_eq!(OpenAiTranslator::parse_response(body).unwrap(), "你好");
    }

    #[test]
    fn test_parse_response_rejects_malformed_and_empty() {
        for body in [
            "not json",
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{"content":"   "}}]}"#,
        ] {
            let err = OpenAiTranslator::parse_response(body).unwrap_err();
            assert!(matches!(err, Error::TranslationInvalidResponse(_)), "{body}: {err}");
            assert!(!err.is_fatal());
        }
    }

    #[tokio::test]
    async fn test_translate_success() {
        let base = serve_once(
            "200 OK",
            "",
            r#"{"choices":[{"message":{"role":"assistant","content":"译文"}}]}"#,
        )
        .await;
        let t = OpenAiTranslator::new(&config(&base), Duration::from_secs(5)).unwrap();
        assert_eq!(t.translate("text").await.unwrap(), "译文");
    }

    #[tokio::test]
    async fn test_translate_rate_limited() {
        let base = serve_once("429 Too Many Requests", "Retry-After: 12\r\n", "{}").await;
        let t = OpenAiTranslator::new(&config(&base), Duration::from_secs(5)).unwrap();
        let err = t.translate("text").await.unwrap_err();
        assert!(matches!(err, Error::TranslationRateLimited { retry_after: Some(12) }));
    }

    #[tokio::test]
    async fn test_translate_server_error() {
        let base = serve_once("502 Bad Gateway", "", r#"{"error":"upstream"}"#).await;
        let t = OpenAiTranslator::new(&config(&base), Duration::from_secs(5)).unwrap();
        let err = t.translate("text").await.unwrap_err();
        assert!(matches!(err, Error::TranslationRequest(ref m) if m.contains("502")));
    }
}
