//! 답변 생성 모듈
//!
//! 검색된 청크를 컨텍스트로 LLM에 질문을 전달해 답변을 받습니다.
//! - `perplexity`: Perplexity chat completions (모델 폴백)
//! - `qa`: 검색 + 프롬프트 구성 + 답변 생성 파이프라인

mod perplexity;
mod qa;

use anyhow::Result;
use async_trait::async_trait;

pub use perplexity::{get_pplx_api_key, PerplexityAnswer, FALLBACK_MODELS};
pub use qa::{ChunkDetail, DocumentQa, QaResponse, QaSources};

/// 시스템 프롬프트
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based only on the provided context. If the context doesn't contain enough information to answer the question, say so.";

// ============================================================================
// Types
// ============================================================================

/// 답변 요청
#[derive(Debug, Clone)]
pub struct AnswerRequest<'a> {
    /// 사용자 프롬프트 (컨텍스트 + 질문)
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl<'a> AnswerRequest<'a> {
    /// 기본 파라미터 (temperature 0.1, max_tokens 1000)
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

/// LLM 답변
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// 실제로 응답한 모델
    pub model: String,
}

// ============================================================================
// AnswerProvider Trait
// ============================================================================

/// 답변 생성 프로바이더 트레이트
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// 프롬프트에 대한 답변 생성
    async fn answer(&self, request: &AnswerRequest<'_>) -> Result<Answer>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Prompt
// ============================================================================

/// RAG 프롬프트 구성
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following document context, please provide a comprehensive and well-formatted answer to the user's question.\n\
         \n\
         Instructions:\n\
         - Use only information from the provided context\n\
         - Format your response with clear headings, bullet points, or numbered lists when appropriate\n\
         - If the context doesn't contain enough information, clearly state this\n\
         - Be thorough but concise\n\
         \n\
         Context:\n\
         {}\n\
         \n\
         User Question: {}\n\
         \n\
         Please provide a well-formatted answer:",
        context, question
    )
}
