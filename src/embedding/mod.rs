//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 청크와 질의를 같은 방식으로 벡터화하는 프로바이더들입니다.
//! - `local`: 오프라인 결정적 임베딩 (토큰 벡터 평균 풀링 + L2 정규화)
//! - `gemini`: Gemini API 임베딩
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(EmbedderKind::Local, None)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

mod gemini;
mod local;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RagError;

pub use gemini::{GeminiEmbedding, GEMINI_DIMENSIONS};
pub use local::{mean_pool, LocalEmbedding, LOCAL_DIMENSION};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 같은 입력과 같은 모델이면 같은 벡터를 반환해야 합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Embedder Kind
// ============================================================================

/// 사용할 임베딩 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    /// 오프라인 결정적 임베딩
    #[default]
    Local,
    /// Gemini API
    Gemini,
}

impl FromStr for EmbedderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(EmbedderKind::Local),
            "gemini" => Ok(EmbedderKind::Gemini),
            other => Err(format!(
                "unknown embedder '{}': expected 'local' or 'gemini'",
                other
            )),
        }
    }
}

impl std::fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedderKind::Local => write!(f, "local"),
            EmbedderKind::Gemini => write!(f, "gemini"),
        }
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성 (명시적 초기화 단계)
///
/// 모델 준비 실패는 문서 처리 전에 `ModelInitialization`으로 드러납니다.
pub fn create_embedder(
    kind: EmbedderKind,
    dimension: Option<usize>,
) -> crate::error::Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match kind {
        EmbedderKind::Local => {
            let embedder = LocalEmbedding::new(dimension.unwrap_or(LOCAL_DIMENSION))
                .map_err(|e| RagError::ModelInitialization(e.to_string()))?;
            Arc::new(embedder)
        }
        EmbedderKind::Gemini => {
            let api_key =
                get_api_key().map_err(|e| RagError::ModelInitialization(e.to_string()))?;
            let embedder = GeminiEmbedding::with_dimension(
                api_key,
                dimension.unwrap_or(gemini::DEFAULT_DIMENSION),
            )
            .map_err(|e| RagError::ModelInitialization(e.to_string()))?;
            Arc::new(embedder)
        }
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
