use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{MobiClawError, MobiClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> MobiClawResult<LlmResponse> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            "sending LLM request"
        );
        tracing::debug!(
            body = %sanitized_for_log(&body),
            "request body (sanitized, base64 omitted)"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(MobiClawError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Accumulate an SSE streaming response into a single reply.
    async fn handle_stream(&self, response: reqwest::Response) -> MobiClawResult<LlmResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLines::default();
        let mut out = LlmResponse::default();

        'stream: while let Some(result) = byte_stream.next().await {
            let bytes = result?;

            for line in lines.push(&bytes) {
                match sse_parser::parse_sse_line(&line) {
                    Ok(Some(chunk)) => match chunk.kind {
                        StreamChunkKind::Reasoning => out.reasoning.push_str(&chunk.content),
                        StreamChunkKind::Content => out.content.push_str(&chunk.content),
                        StreamChunkKind::Done => break 'stream,
                    },
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!("SSE parse skipped: {e}");
                    }
                }
            }
        }

        tracing::info!(
            content_len = out.content.len(),
            reasoning_len = out.reasoning.len(),
            "LLM stream complete"
        );
        Ok(out)
    }

    async fn handle_json(&self, response: reqwest::Response) -> MobiClawResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        let reasoning = json["choices"][0]["message"]["reasoning_content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        tracing::info!(content_len = content.len(), "LLM JSON response received");
        Ok(LlmResponse { content, reasoning })
    }
}

/// Splits a byte stream into trimmed, non-empty lines. Bytes are only decoded once a
/// full line is buffered, so a UTF-8 sequence split across network chunks stays intact.
#[derive(Default)]
struct SseLines {
    buf: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }
}

/// Clone of the request body with image payloads replaced, for debug logging only.
fn sanitized_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            // content can be string or array of parts; only the array case carries images.
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ContentPart, ImageUrl};

    #[test]
    fn log_body_hides_images() {
        let messages = vec![
            ChatMessage::system("find the login button"),
            ChatMessage::user_parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".into(),
                    },
                },
                ContentPart::Text {
                    text: "analyze".into(),
                },
            ]),
        ];
        let body = serde_json::json!({ "messages": messages });
        let logged = sanitized_for_log(&body);
        assert!(logged.contains("<omitted_base64_image>"));
        assert!(!logged.contains("AAAA"));
        assert!(logged.contains("find the login button"));
    }

    #[test]
    fn multibyte_char_split_across_chunks_survives() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"登录\"}}]}\n".as_bytes();
        // Cut inside the first character of the content.
        let cut = line.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut lines = SseLines::default();
        assert!(lines.push(&line[..cut]).is_empty());
        let got = lines.push(&line[cut..]);
        assert_eq!(got.len(), 1);
        assert!(got[0].contains("登录"));
        assert!(!got[0].contains('\u{FFFD}'));
    }

    #[test]
    fn blank_lines_are_dropped_and_partial_line_is_kept() {
        let mut lines = SseLines::default();
        let got = lines.push(b"data: a\r\n\r\ndata: b");
        assert_eq!(got, vec!["data: a".to_string()]);
        assert_eq!(lines.push(b"\n"), vec!["data: b".to_string()]);
    }
}
