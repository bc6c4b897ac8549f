//! External LLM client (component K, judging half): contradiction
//! judging and briefing summarization.

use std::time::Duration;

use crate::error::{EngineError, Result};

/// Something that completes a prompt. The HTTP client is the production
/// implementation; tests use an in-memory fake.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String>;
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// HTTP-backed client calling an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpLlmClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build llm http client");
        Self { client, url, api_key }
    }
}

#[async_trait::async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let mut request = self.client.post(&self.url).json(&ChatRequest {
            model,
            messages: [ChatMessage { role: "user", content: prompt }],
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(format!("llm request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Unavailable(format!("llm returned status {}", response.status())));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Internal(format!("malformed llm response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::Internal("llm returned no choices".into()))
    }
}

/// The parsed verdict of a contradiction judgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContradictionVerdict {
    pub contradicts: bool,
    pub confidence: f64,
}

/// Ask the LLM whether `a` and `b` contradict each other. The prompt asks
/// for a `contradicts: yes|no` line and a `confidence: 0.0-1.0` line;
/// malformed responses are treated as a non-contradiction at zero confidence.
pub async fn judge_contradiction(client: &dyn LlmClient, model: &str, a: &str, b: &str) -> Result<ContradictionVerdict> {
    let prompt = format!(
        "Do these two statements contradict each other?\n\nA: {a}\nB: {b}\n\n\
         Respond with exactly two lines:\ncontradicts: yes|no\nconfidence: <0.0-1.0>"
    );
    let response = client.complete(&prompt, model).await?;
    Ok(parse_verdict(&response))
}

fn parse_verdict(response: &str) -> ContradictionVerdict {
    let mut contradicts = false;
    let mut confidence = 0.0;
    for line in response.lines() {
        let line = line.trim().to_lowercase();
        if let Some(value) = line.strip_prefix("contradicts:") {
            contradicts = value.trim() == "yes";
        } else if let Some(value) = line.strip_prefix("confidence:") {
            confidence = value.trim().parse().unwrap_or(0.0);
        }
    }
    ContradictionVerdict { contradicts, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_verdict() {
        let verdict = parse_verdict("contradicts: yes\nconfidence: 0.82");
        assert!(verdict.contradicts);
        assert!((verdict.confidence - 0.82).abs() < 1e-9);
    }

    #[test]
    fn malformed_response_is_non_contradiction() {
        let verdict = parse_verdict("I'm not sure what you mean");
        assert!(!verdict.contradicts);
        assert_eq!(verdict.confidence, 0.0);
    }
}
