//! Perplexity 답변 프로바이더
//!
//! OpenAI 호환 chat completions API를 호출합니다.
//! 모델 목록을 순서대로 시도하고 처음 성공한 응답을 반환합니다.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{Answer, AnswerProvider, AnswerRequest, SYSTEM_PROMPT};

/// Perplexity chat completions 엔드포인트
const PPLX_CHAT_URL: &str = "https://api.perplexity.ai/chat/completions";

/// 시도할 모델 순서
pub const FALLBACK_MODELS: &[&str] = &[
    "sonar-pro",
    "sonar-reasoning",
    "llama-3.1-sonar-small-128k-online",
    "llama-3.1-sonar-large-128k-online",
    "llama-3.1-sonar-huge-128k-online",
    "llama-3.1-sonar-small-128k-chat",
    "llama-3.1-sonar-large-128k-chat",
    "llama-3.1-sonar-huge-128k-chat",
];

/// Perplexity API 키 로드 (`PPLX_API_KEY`)
pub fn get_pplx_api_key() -> Result<String> {
    match std::env::var("PPLX_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => bail!(
            "Perplexity API key not configured.\n\
             Set: export PPLX_API_KEY=your-api-key"
        ),
    }
}

// ============================================================================
// PerplexityAnswer
// ============================================================================

/// Perplexity 답변 프로바이더
pub struct PerplexityAnswer {
    api_key: String,
    models: Vec<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl PerplexityAnswer {
    /// 기본 모델 목록으로 생성
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_models(
            api_key,
            FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
        )
    }

    /// 모델 목록을 지정하여 생성
    pub fn with_models(api_key: String, models: Vec<String>) -> Result<Self> {
        if models.is_empty() {
            bail!("At least one model is required");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            models,
            endpoint: PPLX_CHAT_URL.to_string(),
            client,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_pplx_api_key()?)
    }

    /// 엔드포인트 교체 (호환 API 사용 시)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid Perplexity API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn try_model(&self, model: &str, request: &AnswerRequest<'_>) -> Result<Answer> {
        let body = ChatRequest {
            model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .context("failed to call Perplexity chat completions")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("{} - {}", status, truncate(&text, 100));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse Perplexity response")?;
        parse_answer(parsed, model)
    }
}

#[async_trait]
impl AnswerProvider for PerplexityAnswer {
    async fn answer(&self, request: &AnswerRequest<'_>) -> Result<Answer> {
        for model in &self.models {
            tracing::info!("Trying model: {}", model);
            match self.try_model(model, request).await {
                Ok(answer) => {
                    tracing::info!("Success with model: {}", answer.model);
                    return Ok(answer);
                }
                Err(e) => {
                    tracing::warn!("Model {} failed: {:#}", model, e);
                }
            }
        }

        tracing::error!("All models failed");
        bail!("All Perplexity models failed. Please check your API key and account status.")
    }

    fn name(&self) -> &str {
        "perplexity"
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

/// 응답 본문 → 답변
fn parse_answer(response: ChatResponse, requested_model: &str) -> Result<Answer> {
    let text = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .context("response contained no choices")?;

    Ok(Answer {
        text,
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"model":"sonar-pro","choices":[{"message":{"role":"assistant","content":"42"}}]}"#,
        )
        .expect("json");
        let answer = parse_answer(response, "sonar-reasoning").expect("answer");
        assert_eq!(answer.text, "42");
        assert_eq!(answer.model, "sonar-pro");
    }

    #[test]
    fn test_parse_answer_defaults_model() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"ok"}}]}"#).expect("json");
        let answer = parse_answer(response, "sonar-pro").expect("answer");
        assert_eq!(answer.model, "sonar-pro");
    }

    #[test]
    fn test_parse_answer_without_choices() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[]}"#).expect("json");
        assert!(parse_answer(response, "sonar-pro").is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "sonar-pro",
            temperature: 0.1,
            max_tokens: 1000,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "sonar-pro");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_requires_models() {
        assert!(PerplexityAnswer::with_models("key".into(), vec![]).is_err());
        assert!(PerplexityAnswer::new("key".into()).is_ok());
    }

    #[tokio::test]
    async fn test_all_models_failing_reports_error() {
        // 닫힌 로컬 포트로 보내 모든 모델이 전송 단계에서 실패
        let provider = PerplexityAnswer::with_models(
            "key".into(),
            vec!["a".into(), "b".into()],
        )
        .expect("provider")
        .with_endpoint("http://127.0.0.1:9/chat/completions");

        let prompt = "question";
        let err = provider
            .answer(&AnswerRequest::new(prompt))
            .await
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("All Perplexity models failed"));
    }
}
