//! 답변 생성 모듈
//!
//! 조립된 프롬프트를 Gemini `generateContent` API로 보내고
//! 생성된 텍스트를 그대로 돌려줍니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::describe_api_error;
use crate::error::LawgicError;

/// Gemini API 베이스 URL
const GEMINI_MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 보수적인 답변을 위한 낮은 temperature
pub const ANSWER_TEMPERATURE: f32 = 0.3;

/// 최대 출력 토큰
const MAX_OUTPUT_TOKENS: u32 = 8192;

// ============================================================================
// AnswerModel Trait
// ============================================================================

/// 답변 생성 모델 트레이트
#[async_trait]
pub trait AnswerModel: Send + Sync {
    /// 프롬프트로 답변 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Chat
// ============================================================================

/// Gemini 생성 모델 클라이언트
#[derive(Debug)]
pub struct GeminiChat {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiChat {
    /// 모델 이름을 지정하여 생성
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_MODELS_URL, self.model)
    }

    fn build_request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: ANSWER_TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }
}

#[async_trait]
impl AnswerModel for GeminiChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = Self::build_request(prompt);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LawgicError::generation(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LawgicError::generation(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(LawgicError::generation(describe_api_error(status, &body)).into());
        }

        let text = parse_answer(&body)?;
        tracing::debug!("Generated answer ({} chars) with {}", text.len(), self.model);
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 응답 본문에서 첫 후보의 텍스트 추출
///
/// 여러 part로 나뉜 경우 이어 붙입니다. 후보가 없으면 (안전 필터 차단 등)
/// 빈 문자열 대신 프로바이더 실패로 처리합니다.
fn parse_answer(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| LawgicError::generation(format!("malformed response: {}", e)))?;

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        LawgicError::generation(reason)
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty response".to_string());
        return Err(LawgicError::generation(format!("model returned no text ({})", reason)).into());
    }

    Ok(text)
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
