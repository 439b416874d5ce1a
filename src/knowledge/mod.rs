//! Knowledge 모듈 - 단일 문서 검색 엔진
//!
//! - Chunker: 문장 경계 인식 오버랩 청킹
//! - Vector: 거리/정규화 유틸리티와 인덱스 트레이트
//! - Flat: 전수 탐색 L2 인덱스
//! - Engine: 청킹 → 임베딩 → 인덱싱 → 검색 통합

mod chunker;
mod engine;
mod flat;
mod vector;

// Re-exports
pub use chunker::{Chunk, ChunkConfig, Chunker, SentenceChunker, PAGE_BREAK};
pub use engine::{
    BuildSummary, EngineConfig, EngineStats, EngineStatus, IndexFactory, RetrievalEngine,
    RetrievedChunk,
};
pub use flat::FlatIndex;
pub use vector::{
    distance_to_similarity, l2_norm, l2_normalize, squared_euclidean, Neighbor, VectorIndex,
};
