//! 검색 엔진 에러 타입
//!
//! 청킹, 임베딩, 인덱싱, 검색 단계에서 발생하는 에러를 분류합니다.
//! 수집/응답 생성 같은 외부 협력자 코드는 `anyhow`를 그대로 사용합니다.

use std::time::Duration;

/// 검색 엔진 결과 타입
pub type Result<T> = std::result::Result<T, RagError>;

/// 검색 엔진 에러
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// 잘못된 청크/오버랩 설정 (재시도 불가)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// 임베딩 백엔드 초기화 실패
    #[error("Embedding model initialization failed: {0}")]
    ModelInitialization(String),

    /// 임베딩 생성 실패
    #[error("Embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// 임베딩 호출 타임아웃
    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),

    /// 임베딩 차원 불일치
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 추출된 텍스트에서 청크가 하나도 나오지 않음
    #[error("Document produced no usable chunks")]
    EmptyDocument,

    /// 인덱싱된 문서가 없음
    #[error("No document has been indexed yet")]
    NotReady,

    /// 청크 목록과 벡터 인덱스 크기 불일치
    #[error("Index desynchronized: {chunks} chunks vs {vectors} vectors")]
    IndexDesynchronization { chunks: usize, vectors: usize },
}

impl RagError {
    /// 호출자가 나중에 다시 시도해도 되는 에러인지
    ///
    /// 엔진 내부에서는 재시도하지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::ModelInitialization(_) | RagError::Embedding(_) | RagError::Timeout(_)
        )
    }
}
