//! JSON client for a model inference server.
//!
//! The server exposes one route per collaborator:
//!
//! | route          | request                          | response                     |
//! |----------------|----------------------------------|------------------------------|
//! | `/segment`     | `{text}`                         | `{sentences: [..]}`          |
//! | `/tag`         | `{text, category}`               | `{tokens: [{text, label}]}`  |
//! | `/cefr`        | `{sentence}`                     | `{level}`                    |
//! | `/fill-mask`   | `{masked_sentence, top_k}`       | `{predictions: [..]}`        |
//! | `/align`       | `{audio, transcript}`            | `{words: [..]}`              |
//! | `/correct`     | `{sentence, model}`              | `{corrected}`                |

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bandscore_core::model::{
    AnnotatedSentence, CefrLevel, DisfluencyCategory, TaggedToken, WordAlignment,
};
use bandscore_core::traits::{
    AlignmentRequest, CefrClassifier, CorrectionRequest, DisfluencyTagger, FillMaskPredictor,
    ForcedAligner, GrammarCorrector, SentenceSegmenter,
};

use crate::error::ProviderError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MASK_TOKEN: &str = "[MASK]";

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
}

fn normalize_base(base_url: &str) -> String {
    let base = if base_url.is_empty() {
        DEFAULT_BASE_URL
    } else {
        base_url
    };
    base.trim_end_matches('/').to_string()
}

async fn post_json<B, R>(
    client: &reqwest::Client,
    base_url: &str,
    route: &str,
    body: &B,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(format!("{base_url}{route}"))
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(e, DEFAULT_TIMEOUT_SECS))?;

    if !response.status().is_success() {
        return Err(ProviderError::from_response(response, route).await);
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse {
            source_name: route.to_string(),
            reason: e.to_string(),
        })
}

/// Inference-server client for every collaborator except grammar
/// correction.
pub struct HttpCollaborators {
    base_url: String,
    mask_token: String,
    client: reqwest::Client,
}

impl HttpCollaborators {
    pub fn new(base_url: &str, mask_token: Option<String>) -> Self {
        Self {
            base_url: normalize_base(base_url),
            mask_token: mask_token.unwrap_or_else(|| DEFAULT_MASK_TOKEN.to_string()),
            client: build_client(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct TextBody<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SegmentResponse {
    sentences: Vec<AnnotatedSentence>,
}

#[derive(Serialize)]
struct TagBody<'a> {
    text: &'a str,
    category: DisfluencyCategory,
}

#[derive(Deserialize)]
struct TagResponse {
    tokens: Vec<TaggedToken>,
}

#[derive(Serialize)]
struct SentenceBody<'a> {
    sentence: &'a str,
}

#[derive(Deserialize)]
struct CefrResponse {
    level: String,
}

#[derive(Serialize)]
struct FillMaskBody<'a> {
    masked_sentence: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct FillMaskResponse {
    predictions: Vec<FillMaskPrediction>,
}

/// Servers return either bare tokens or `{token, score}` objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum FillMaskPrediction {
    Token(String),
    Scored { token: String },
}

#[derive(Serialize)]
struct AlignBody<'a> {
    audio: &'a Path,
    transcript: &'a str,
}

#[derive(Deserialize)]
struct AlignResponse {
    words: Vec<WordAlignment>,
}

#[async_trait]
impl SentenceSegmenter for HttpCollaborators {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn segment(&self, text: &str) -> anyhow::Result<Vec<AnnotatedSentence>> {
        let response: SegmentResponse =
            post_json(&self.client, &self.base_url, "/segment", &TextBody { text }).await?;
        Ok(response.sentences)
    }
}

#[async_trait]
impl DisfluencyTagger for HttpCollaborators {
    #[instrument(skip(self, text), fields(%category))]
    async fn tag(
        &self,
        text: &str,
        category: DisfluencyCategory,
    ) -> anyhow::Result<Vec<TaggedToken>> {
        let response: TagResponse = post_json(
            &self.client,
            &self.base_url,
            "/tag",
            &TagBody { text, category },
        )
        .await?;
        Ok(response.tokens)
    }
}

#[async_trait]
impl CefrClassifier for HttpCollaborators {
    #[instrument(skip_all)]
    async fn classify(&self, sentence: &str) -> anyhow::Result<CefrLevel> {
        let response: CefrResponse =
            post_json(&self.client, &self.base_url, "/cefr", &SentenceBody { sentence }).await?;
        response.level.parse().map_err(|reason: String| {
            ProviderError::InvalidResponse {
                source_name: "/cefr".into(),
                reason,
            }
            .into()
        })
    }
}

#[async_trait]
impl FillMaskPredictor for HttpCollaborators {
    fn mask_token(&self) -> &str {
        &self.mask_token
    }

    #[instrument(skip(self, masked_sentence))]
    async fn predict(&self, masked_sentence: &str, top_k: usize) -> anyhow::Result<Vec<String>> {
        let response: FillMaskResponse = post_json(
            &self.client,
            &self.base_url,
            "/fill-mask",
            &FillMaskBody {
                masked_sentence,
                top_k,
            },
        )
        .await?;
        Ok(response
            .predictions
            .into_iter()
            .map(|p| match p {
                FillMaskPrediction::Token(token) | FillMaskPrediction::Scored { token } => token,
            })
            .take(top_k)
            .collect())
    }
}

#[async_trait]
impl ForcedAligner for HttpCollaborators {
    #[instrument(skip_all, fields(audio = %request.audio.display()))]
    async fn align(&self, request: &AlignmentRequest) -> anyhow::Result<Vec<WordAlignment>> {
        let response: AlignResponse = post_json(
            &self.client,
            &self.base_url,
            "/align",
            &AlignBody {
                audio: &request.audio,
                transcript: &request.transcript,
            },
        )
        .await?;
        Ok(response.words)
    }
}

/// Grammar corrector served by the inference server's `/correct` route.
pub struct HttpCorrector {
    name: String,
    base_url: String,
    model: Option<String>,
    client: reqwest::Client,
}

impl HttpCorrector {
    pub fn new(name: &str, base_url: &str, model: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            base_url: normalize_base(base_url),
            model,
            client: build_client(),
        }
    }
}

#[derive(Serialize)]
struct CorrectBody<'a> {
    sentence: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct CorrectResponse {
    corrected: String,
}

#[async_trait]
impl GrammarCorrector for HttpCorrector {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(backend = %self.name))]
    async fn correct(&self, request: &CorrectionRequest) -> anyhow::Result<String> {
        let model = request.model.as_deref().or(self.model.as_deref());
        let body = CorrectBody {
            sentence: &request.sentence,
            model,
        };
        let response: CorrectResponse = post_json(&self.client, &self.base_url, "/correct", &body)
            .await
            .map_err(|e| match e {
                ProviderError::ModelNotFound(_) => {
                    ProviderError::ModelNotFound(model.unwrap_or(&self.name).to_string())
                }
                other => other,
            })?;
        Ok(response.corrected.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn segment_parses_sentences() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "sentences": [{
                "text": "I like tea.",
                "tokens": [
                    {"text": "I", "lemma": "I", "pos": "PRON", "tag": "PRP", "dep": "nsubj", "head": 1},
                    {"text": "like", "lemma": "like", "pos": "VERB", "tag": "VBP", "dep": "ROOT", "head": 1},
                    {"text": "tea", "lemma": "tea", "pos": "NOUN", "tag": "NN", "dep": "dobj", "head": 1},
                    {"text": ".", "lemma": ".", "pos": "PUNCT", "tag": ".", "dep": "punct", "head": 1}
                ]
            }]
        });
        Mock::given(method("POST"))
            .and(path("/segment"))
            .and(body_json(serde_json::json!({"text": "I like tea."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = HttpCollaborators::new(&server.uri(), None);
        let sentences = client.segment("I like tea.").await.unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].tokens[1].pos, "VERB");
    }

    #[tokio::test]
    async fn tag_sends_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tag"))
            .and(body_json(serde_json::json!({"text": "um yes", "category": "filled_pause"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tokens": [{"text": "um", "label": 1}, {"text": "yes", "label": 0}]
            })))
            .mount(&server)
            .await;

        let client = HttpCollaborators::new(&server.uri(), None);
        let tokens = client
            .tag("um yes", DisfluencyCategory::FilledPause)
            .await
            .unwrap();
        assert!(tokens[0].is_marked());
        assert!(!tokens[1].is_marked());
    }

    #[tokio::test]
    async fn cefr_rejects_unknown_level() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cefr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"level": "D4"})))
            .mount(&server)
            .await;

        let client = HttpCollaborators::new(&server.uri(), None);
        let err = client.classify("Hello.").await.unwrap_err();
        assert!(err.to_string().contains("unknown CEFR level"));
    }

    #[tokio::test]
    async fn fill_mask_accepts_scored_predictions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fill-mask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "predictions": [{"token": "strong", "score": 0.4}, "heavy", {"token": "black", "score": 0.1}]
            })))
            .mount(&server)
            .await;

        let client = HttpCollaborators::new(&server.uri(), Some("<mask>".into()));
        assert_eq!(client.mask_token(), "<mask>");
        let predictions = client.predict("a <mask> coffee", 2).await.unwrap();
        assert_eq!(predictions, vec!["strong", "heavy"]);
    }

    #[tokio::test]
    async fn correct_uses_request_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/correct"))
            .and(body_json(serde_json::json!({"sentence": "he go home", "model": "coedit-xl"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"corrected": "He goes home. "})))
            .mount(&server)
            .await;

        let corrector = HttpCorrector::new("coedit", &server.uri(), Some("coedit-large".into()));
        let corrected = corrector
            .correct(&CorrectionRequest {
                sentence: "he go home".into(),
                model: Some("coedit-xl".into()),
            })
            .await
            .unwrap();
        assert_eq!(corrected, "He goes home.");
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/correct"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/align"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let corrector = HttpCorrector::new("coedit", &server.uri(), Some("coedit-xl".into()));
        let err = corrector
            .correct(&CorrectionRequest {
                sentence: "x".into(),
                model: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model not found: coedit-xl");

        let client = HttpCollaborators::new(&server.uri(), None);
        let err = client
            .align(&AlignmentRequest {
                audio: "a.wav".into(),
                transcript: "x".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rate limited, retry after 2000ms");
    }
}
