//! OpenAI-compatible chat-completions grammar corrector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bandscore_core::traits::{CorrectionRequest, GrammarCorrector};

use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You correct the grammar of transcribed spoken English. Reply with the corrected sentence only, with no explanation or quotation marks. Keep the speaker's wording wherever it is already grammatical. If the sentence has no errors, repeat it unchanged.";

/// Grammar corrector backed by a chat-completions endpoint.
pub struct OpenAiCorrector {
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCorrector {
    pub fn new(name: &str, api_key: &str, base_url: Option<String>, model: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: String,
}

/// Strip whitespace and one pair of wrapping quotes from a model reply.
fn clean_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('\'', '\'')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

#[async_trait]
impl GrammarCorrector for OpenAiCorrector {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, request), fields(backend = %self.name))]
    async fn correct(&self, request: &CorrectionRequest) -> anyhow::Result<String> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = OpenAiRequest {
            model,
            temperature: 0.0,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                OpenAiMessage {
                    role: "user",
                    content: &request.sentence,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, DEFAULT_TIMEOUT_SECS))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response, model).await.into());
        }

        let api_response: OpenAiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    source_name: self.name.clone(),
                    reason: e.to_string(),
                })?;

        let content = api_response
            .choices
            .first()
            .map(|c| clean_reply(&c.message.content))
            .unwrap_or_default();

        if content.is_empty() {
            anyhow::bail!("{} returned an empty correction", self.name);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(sentence: &str) -> CorrectionRequest {
        CorrectionRequest {
            sentence: sentence.into(),
            model: None,
        }
    }

    #[tokio::test]
    async fn successful_correction() {
        let server = MockServer::start().await;
        let response_body = serde_json::json!({
            "choices": [{"message": {"content": "\"She goes to work by bus.\"", "role": "assistant"}, "index": 0}],
            "model": "gpt-4o-mini"
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let corrector = OpenAiCorrector::new("gpt", "test-key", Some(server.uri()), None);
        let corrected = corrector
            .correct(&request("She go to work by bus."))
            .await
            .unwrap();
        assert_eq!(corrected, "She goes to work by bus.");
        assert_eq!(corrector.name(), "gpt");
    }

    #[tokio::test]
    async fn authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let corrector = OpenAiCorrector::new("gpt", "bad", Some(server.uri()), None);
        let err = corrector.correct(&request("x")).await.unwrap_err();
        assert_eq!(err.to_string(), "authentication failed: invalid api key");
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let corrector = OpenAiCorrector::new("gpt", "key", Some(server.uri()), None);
        let err = corrector.correct(&request("x")).await.unwrap_err();
        assert!(err.to_string().contains("empty correction"));
    }

    #[test]
    fn reply_cleanup() {
        assert_eq!(clean_reply("  I am here. \n"), "I am here.");
        assert_eq!(clean_reply("“I am here.”"), "I am here.");
        assert_eq!(clean_reply("It's fine"), "It's fine");
    }
}
