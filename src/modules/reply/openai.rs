//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    modules::{
        error::{code::ErrorCode, OneboxResult},
        reply::ReplySuggester,
    },
    raise_error,
};

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn failed(message: String) -> crate::modules::error::OneboxError {
    raise_error!(message, ErrorCode::ReplyGenerationFailed)
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Retrieval-augmented replies over an OpenAI-compatible API: the agenda
/// snippet closest to the email by embedding similarity becomes the context
/// of a chat completion.
pub struct OpenAiSuggester {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    agenda: Vec<String>,
}

impl OpenAiSuggester {
    pub fn new(
        base_url: &str,
        api_key: &str,
        chat_model: &str,
        embedding_model: &str,
        agenda: Vec<String>,
        timeout: Duration,
    ) -> OneboxResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            raise_error!(
                format!("Failed to build reply HTTP client: {}", e),
                ErrorCode::InternalError
            )
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chat_model: chat_model.to_string(),
            embedding_model: embedding_model.to_string(),
            agenda,
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> OneboxResult<T> {
        let endpoint = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| failed(format!("Request to {} failed: {}", endpoint, e)))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(failed(format!(
                "{} responded with status {}: {}",
                endpoint, status, detail
            )));
        }
        response
            .json()
            .await
            .map_err(|e| failed(format!("Unexpected response from {}: {}", endpoint, e)))
    }

    /// One embedding per input, in input order.
    async fn embed(&self, inputs: &[&str]) -> OneboxResult<Vec<Vec<f32>>> {
        let body = json!({ "model": self.embedding_model, "input": inputs });
        let mut response: EmbeddingResponse = self.post("/embeddings", &body).await?;
        if response.data.len() != inputs.len() {
            return Err(failed(format!(
                "Expected {} embeddings, got {}",
                inputs.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }

    async fn best_context(&self, email_text: &str) -> OneboxResult<&str> {
        let mut inputs = vec![email_text];
        inputs.extend(self.agenda.iter().map(String::as_str));
        let vectors = self.embed(&inputs).await?;
        let (email, snippets) = vectors
            .split_first()
            .ok_or_else(|| failed("Embedding response was empty".into()))?;

        let mut best: Option<(usize, f32)> = None;
        for (i, vector) in snippets.iter().enumerate() {
            let score = cosine(email, vector);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((i, score));
            }
        }
        let (i, score) =
            best.ok_or_else(|| failed("No agenda snippets available for reply context".into()))?;
        debug!("Reply context snippet {} selected with similarity {:.3}", i, score);
        Ok(&self.agenda[i])
    }
}

#[async_trait]
impl ReplySuggester for OpenAiSuggester {
    async fn suggest(&self, email_text: &str) -> OneboxResult<String> {
        let context = self.best_context(email_text).await?;
        let prompt = format!(
            "Context: {}\nEmail: {}\n\nSuggest a professional and helpful reply:",
            context, email_text
        );
        let body = json!({
            "model": self.chat_model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ]
        });
        let response: ChatResponse = self.post("/chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| failed("Chat completion returned no content".into()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::common::testing::serve_loopback;
    use poem::{handler, http::StatusCode, post, web::Json, Route};

    /// Email and the second snippet point the same way.
    #[handler]
    fn embeddings(Json(body): Json<Value>) -> Json<Value> {
        let count = body["input"].as_array().map(Vec::len).unwrap_or(0);
        let data: Vec<Value> = (0..count)
            .rev()
            .map(|i| {
                let embedding = match i {
                    0 | 2 => vec![0.0, 1.0],
                    _ => vec![1.0, 0.0],
                };
                json!({ "index": i, "embedding": embedding })
            })
            .collect();
        Json(json!({ "data": data }))
    }

    #[handler]
    fn chat(Json(body): Json<Value>) -> Json<Value> {
        let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
        let context = prompt
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("Context: ");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": format!(" Reply using: {} ", context) } }]
        }))
    }

    #[handler]
    fn unauthorized() -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn suggester(base: &str) -> OpenAiSuggester {
        OpenAiSuggester::new(
            base,
            "sk-test",
            "gpt-test",
            "embed-test",
            vec!["pricing sheet".into(), "demo link".into(), "job link".into()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert!((cosine(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn closest_snippet_becomes_the_chat_context() {
        let base = serve_loopback(
            Route::new()
                .at("/v1/embeddings", post(embeddings))
                .at("/v1/chat/completions", post(chat)),
        )
        .await;
        let reply = suggester(&format!("{}/v1/", base))
            .suggest("Can I get a demo?")
            .await
            .unwrap();
        assert_eq!(reply, "Reply using: demo link");
    }

    #[tokio::test]
    async fn api_errors_become_reply_failures() {
        let base = serve_loopback(Route::new().at("/embeddings", post(unauthorized))).await;
        let err = suggester(&base).suggest("hello").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReplyGenerationFailed);
        assert!(err.to_string().contains("401"));
    }
}
