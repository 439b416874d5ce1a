//! 문서 질의응답 파이프라인
//!
//! 검색 → 컨텍스트 결합 → 프롬프트 구성 → 답변 생성

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::knowledge::{RetrievalEngine, RetrievedChunk};

use super::{build_prompt, AnswerProvider, AnswerRequest};

/// 미리보기 길이 (문자 수)
const PREVIEW_CHARS: usize = 200;

// ============================================================================
// Types
// ============================================================================

/// 질의응답 결과
#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    pub answer: String,
    pub question: String,
    pub model: String,
    pub supporting_chunks: Vec<RetrievedChunk>,
    pub sources: QaSources,
    pub context_length: usize,
}

/// 답변 근거 요약
#[derive(Debug, Clone, Serialize)]
pub struct QaSources {
    pub chunks_used: usize,
    pub total_chunks: usize,
    pub chunk_details: Vec<ChunkDetail>,
}

/// 근거 청크 요약
#[derive(Debug, Clone, Serialize)]
pub struct ChunkDetail {
    /// 1부터 시작하는 순위
    pub rank: usize,
    pub page: usize,
    /// 소수점 둘째 자리 스코어
    pub relevance_score: String,
    pub preview: String,
}

impl ChunkDetail {
    fn from_result(rank: usize, chunk: &RetrievedChunk) -> Self {
        let preview = if chunk.text.chars().count() > PREVIEW_CHARS {
            let head: String = chunk.text.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", head)
        } else {
            chunk.text.clone()
        };

        Self {
            rank,
            page: chunk.page_number,
            relevance_score: format!("{:.2}", chunk.similarity),
            preview,
        }
    }
}

// ============================================================================
// DocumentQa
// ============================================================================

/// 검색 엔진 + 답변 프로바이더
pub struct DocumentQa {
    engine: Arc<RetrievalEngine>,
    provider: Arc<dyn AnswerProvider>,
}

impl DocumentQa {
    pub fn new(engine: Arc<RetrievalEngine>, provider: Arc<dyn AnswerProvider>) -> Self {
        Self { engine, provider }
    }

    /// 내부 검색 엔진
    pub fn engine(&self) -> &Arc<RetrievalEngine> {
        &self.engine
    }

    /// 질문에 답변
    pub async fn ask(&self, question: &str, top_k: usize) -> Result<QaResponse> {
        let question = question.trim();
        if question.is_empty() {
            bail!("Query cannot be empty");
        }

        tracing::info!("Processing query: '{}'", question);

        let supporting_chunks = self
            .engine
            .retrieve(question, top_k)
            .await
            .context("Failed to retrieve supporting chunks")?;

        if supporting_chunks.is_empty() {
            bail!("No relevant chunks found. Please try a different question.");
        }

        let context = RetrievalEngine::build_context(&supporting_chunks);
        tracing::info!(
            "Found {} chunks, context length: {} characters",
            supporting_chunks.len(),
            context.chars().count()
        );

        let prompt = build_prompt(&context, question);
        let answer = self
            .provider
            .answer(&AnswerRequest::new(&prompt))
            .await
            .with_context(|| format!("{} answer failed", self.provider.name()))?;

        let chunk_details = supporting_chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ChunkDetail::from_result(i + 1, chunk))
            .collect();

        Ok(QaResponse {
            answer: answer.text,
            question: question.to_string(),
            model: answer.model,
            sources: QaSources {
                chunks_used: supporting_chunks.len(),
                total_chunks: self.engine.chunk_count().await,
                chunk_details,
            },
            supporting_chunks,
            context_length: context.chars().count(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
