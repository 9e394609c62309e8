use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{ChatModel, Embedder};
use super::types::ChatRequest;
use crate::core::config::{EmbeddingConfig, LlmConfig};
use crate::core::errors::RagError;

/// Chat client for any OpenAI-compatible `/v1/chat/completions` endpoint (Groq by default).
#[derive(Clone)]
pub struct OpenAiCompatibleChat {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: Option<u32>,
    client: Client,
}

impl OpenAiCompatibleChat {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            temperature: crate::core::config::DEFAULT_TEMPERATURE,
            max_tokens: None,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(RagError::config)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": stream,
            "temperature": request.temperature.unwrap_or(self.temperature),
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(top_p) = request.top_p {
                obj.insert("top_p".to_string(), json!(top_p));
            }
            if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
                obj.insert("max_tokens".to_string(), json!(max_tokens));
            }
            if let Some(stop) = &request.stop {
                obj.insert("stop".to_string(), json!(stop));
            }
        }

        body
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleChat {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&request, false);

        let res = self.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Model(format!("chat completion failed ({}): {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(RagError::model)?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RagError::Model("chat completion returned no content".to_string()))
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&request, true);

        let res = self.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Model(format!("chat stream failed ({}): {}", status, text)));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = SseLineBuffer::default();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        for line in buffer.push(&bytes) {
                            match parse_sse_line(line.trim()) {
                                SseLine::Done => return,
                                SseLine::Content(content) => {
                                    if tx.send(Ok(content)).await.is_err() {
                                        return;
                                    }
                                }
                                SseLine::Skip => {}
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(RagError::model(e))).await;
                        return;
                    }
                }
            }
            if let Some(line) = buffer.finish() {
                if let SseLine::Content(content) = parse_sse_line(line.trim()) {
                    let _ = tx.send(Ok(content)).await;
                }
            }
        });

        Ok(rx)
    }
}

/// Splits a byte stream into lines. Network chunks may end inside a line or
/// inside a multi-byte character, so bytes are only decoded once a line is complete.
#[derive(Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(line) = decode_line(line) {
                lines.push(line);
            }
        }
        lines
    }

    fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        decode_line(self.pending)
    }
}

fn decode_line(line: Vec<u8>) -> Option<String> {
    match String::from_utf8(line) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::warn!("Skipping SSE line with invalid UTF-8: {}", e);
            None
        }
    }
}

enum SseLine {
    Content(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    if line == "data: [DONE]" {
        return SseLine::Done;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    match serde_json::from_str::<Value>(data.trim()) {
        Ok(json) => match json["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => SseLine::Content(content.to_string()),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

/// Embedding client for OpenAI-compatible `/v1/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiCompatibleEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(RagError::config)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiCompatibleEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let res = builder.send().await.map_err(RagError::embedding)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("embedding request failed: {}", text)));
        }

        let payload: Value = res.json().await.map_err(RagError::embedding)?;

        let embeddings = parse_embeddings(&payload)?;

        if embeddings.len() != inputs.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}

/// Reads `data[].embedding` ordered by `data[].index`.
fn parse_embeddings(payload: &Value) -> Result<Vec<Vec<f32>>, RagError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| RagError::Embedding("embedding response has no data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        let values = item["embedding"].as_array().ok_or_else(|| {
            RagError::Embedding(format!("embedding {} is not an array", index))
        })?;

        let vector = values
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    RagError::Embedding(format!("embedding {} has non-numeric value {}", index, v))
                })
            })
            .collect::<Result<Vec<f32>, RagError>>()?;
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::llm::types::ChatMessage;

    fn completion(content: &str) -> Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn chat_sends_model_key_and_default_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(json!({
                "model": "llama-3.1-8b-instant",
                "temperature": 0.5,
                "stream": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Yes, it is IP68 rated.")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiCompatibleChat::new(server.uri(), "llama-3.1-8b-instant").with_api_key("gsk_test");
        let answer = chat
            .chat(ChatRequest::new(vec![ChatMessage::user("Is this phone waterproof?")]))
            .await
            .expect("chat should succeed");

        assert_eq!(answer, "Yes, it is IP68 rated.");
    }

    #[tokio::test]
    async fn request_temperature_overrides_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "temperature": 0.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiCompatibleChat::new(server.uri(), "m");
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).with_temperature(0.0);
        assert_eq!(chat.chat(request).await.expect("chat"), "ok");
    }

    #[tokio::test]
    async fn non_success_status_is_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let chat = OpenAiCompatibleChat::new(server.uri(), "m");
        let err = chat
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .expect_err("should fail");

        assert!(matches!(&err, RagError::Model(msg) if msg.contains("rate limited")));
    }

    #[tokio::test]
    async fn missing_content_is_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let chat = OpenAiCompatibleChat::new(server.uri(), "m");
        let err = chat.chat(ChatRequest::new(vec![])).await.expect_err("should fail");
        assert!(matches!(err, RagError::Model(_)));
    }

    #[tokio::test]
    async fn stream_chat_forwards_deltas_until_done() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Battery \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lasts two days.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse))
            .mount(&server)
            .await;

        let chat = OpenAiCompatibleChat::new(server.uri(), "m");
        let mut rx = chat
            .stream_chat(ChatRequest::new(vec![ChatMessage::user("battery?")]))
            .await
            .expect("stream should start");

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk.expect("chunk"));
        }
        assert_eq!(chunks, vec!["Battery ", "lasts two days."]);
    }

    #[test]
    fn sse_parser_ignores_comments_and_empty_deltas() {
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(
            parse_sse_line("data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}"),
            SseLine::Skip
        ));
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
    }

    #[test]
    fn line_buffer_joins_character_split_across_chunks() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"₹999\"}}]}\n".as_bytes();
        let rupee_start = event
            .windows(3)
            .position(|w| w == "₹".as_bytes())
            .expect("rupee sign present");
        let (first, second) = event.split_at(rupee_start + 1);

        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(first).is_empty());
        let lines = buffer.push(second);

        assert_eq!(lines.len(), 1);
        assert!(matches!(
            parse_sse_line(lines[0].trim()),
            SseLine::Content(content) if content == "₹999"
        ));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn line_buffer_keeps_unterminated_tail_for_finish() {
        let mut buffer = SseLineBuffer::default();
        let lines = buffer.push(b"data: [DONE]\n\ndata: {\"partial\"");
        assert_eq!(lines, vec!["data: [DONE]\n", "\n"]);
        assert_eq!(buffer.finish().as_deref(), Some("data: {\"partial\""));
    }

    #[tokio::test]
    async fn stream_chat_keeps_multibyte_content_intact() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"कीमत \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"₹999\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse))
            .mount(&server)
            .await;

        let chat = OpenAiCompatibleChat::new(server.uri(), "m");
        let mut rx = chat
            .stream_chat(ChatRequest::new(vec![ChatMessage::user("price?")]))
            .await
            .expect("stream should start");

        let mut answer = String::new();
        while let Some(chunk) = rx.recv().await {
            answer.push_str(&chunk.expect("chunk"));
        }
        assert_eq!(answer, "कीमत ₹999");
    }

    #[tokio::test]
    async fn embedder_returns_one_vector_per_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "embedding": [0.1, 0.2] },
                    { "embedding": [0.3, 0.4] },
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiCompatibleEmbedder::new(server.uri(), "bge");
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .expect("embed");

        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn embeddings_follow_response_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.3, 0.4] },
                { "index": 0, "embedding": [0.1, 0.2] },
            ]
        });
        let vectors = parse_embeddings(&payload).expect("parse");
        assert_eq!(vectors, vec![vec![0.1_f32, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn embedder_rejects_non_numeric_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [0.1, "NaN", 0.3] }]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiCompatibleEmbedder::new(server.uri(), "bge");
        let err = embedder.embed(&["a".to_string()]).await.expect_err("should fail");
        assert!(matches!(&err, RagError::Embedding(msg) if msg.contains("non-numeric")));
    }

    #[tokio::test]
    async fn embedder_rejects_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [0.1] }]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiCompatibleEmbedder::new(server.uri(), "bge");
        let err = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .expect_err("should fail");
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
