//! pdf-rag - PDF 문서 질의응답 RAG 시스템
//!
//! 문서를 청크로 분할하고 임베딩 벡터 인덱스를 만든 뒤,
//! 질문과 가장 가까운 청크를 찾아 LLM 답변의 근거로 사용합니다.

pub mod answer;
pub mod cli;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;

// Re-exports
pub use answer::{AnswerProvider, DocumentQa, PerplexityAnswer, QaResponse};
pub use embedding::{
    create_embedder, get_api_key, EmbedderKind, EmbeddingProvider, GeminiEmbedding,
    LocalEmbedding,
};
pub use error::{RagError, Result};
pub use extractor::{extract_document, ExtractedDocument, SourceType};
pub use knowledge::{
    BuildSummary, Chunk, ChunkConfig, Chunker, EngineConfig, EngineStats,
    EngineStatus, FlatIndex, RetrievalEngine, RetrievedChunk, SentenceChunker, VectorIndex,
};
