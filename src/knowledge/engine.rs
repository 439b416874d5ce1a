//! 검색 엔진 - 청커 + 임베딩 + 벡터 인덱스 통합
//!
//! 문서 하나를 청크로 나눠 임베딩하고, 질의와 가장 가까운 청크를 찾습니다.
//!
//! 빌드가 성공할 때마다 불변 세대(청크 목록 + 벡터 인덱스)를 새로 만들어 통째로 교체합니다.
//! 검색은 읽기 락 아래에서 현재 세대의 `Arc`만 복제해 사용하므로
//! 빌드 중에도 이전 세대 또는 새 세대 중 하나만 보게 됩니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

use super::chunker::{Chunk, ChunkConfig, Chunker, SentenceChunker};
use super::flat::FlatIndex;
use super::vector::{l2_normalize, VectorIndex};

// ============================================================================
// Configuration
// ============================================================================

/// 벡터 인덱스 생성 함수 (차원, 예상 행 수 → 빈 인덱스)
pub type IndexFactory = Arc<dyn Fn(usize, usize) -> Box<dyn VectorIndex> + Send + Sync>;

/// 엔진 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 청킹 설정
    pub chunk: ChunkConfig,
    /// 기본 검색 결과 수
    pub default_top_k: usize,
    /// 임베딩 호출당 타임아웃
    pub embed_timeout: Duration,
    /// 동시 임베딩 요청 수
    pub embed_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            default_top_k: 3,
            embed_timeout: Duration::from_secs(30),
            embed_concurrency: 4,
        }
    }
}

impl EngineConfig {
    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;
        if self.embed_concurrency == 0 {
            return Err(RagError::Configuration(
                "embed_concurrency must be at least 1".to_string(),
            ));
        }
        if self.embed_timeout.is_zero() {
            return Err(RagError::Configuration(
                "embed_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Types
// ============================================================================

/// 엔진 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// 인덱싱된 문서 없음
    Uninitialized,
    /// 문서 인덱싱 중
    Indexing,
    /// 검색 가능
    Ready,
}

/// 검색된 청크
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// 청크 번호 (= 벡터 인덱스 행 번호)
    pub chunk_index: usize,
    /// 청크 텍스트
    pub text: String,
    /// 시작 오프셋 (문자 단위)
    pub start_offset: usize,
    /// 끝 오프셋 (문자 단위)
    pub end_offset: usize,
    /// 추정 페이지 번호
    pub page_number: usize,
    /// 랭킹 스코어 (`1 - 제곱 거리`, 확률 아님)
    pub similarity: f32,
}

/// 인덱스 빌드 결과
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub document_id: Uuid,
    pub chunk_count: usize,
    pub text_length: usize,
    pub dimension: usize,
    pub elapsed_ms: u128,
}

/// 엔진 통계
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub status: EngineStatus,
    pub chunk_count: usize,
    pub dimension: usize,
    pub embedder: String,
    pub document_id: Option<Uuid>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub text_length: usize,
    pub sample_chunk: Option<String>,
}

/// 한 번의 빌드로 만들어진 불변 세대
struct Generation {
    document_id: Uuid,
    indexed_at: DateTime<Utc>,
    text_length: usize,
    chunks: Vec<Chunk>,
    index: Box<dyn VectorIndex>,
}

impl Generation {
    /// 청크 목록과 인덱스 정렬 확인
    fn check_alignment(&self) -> Result<()> {
        check_alignment(self.chunks.len(), self.index.len())
    }
}

// ============================================================================
// RetrievalEngine
// ============================================================================

/// 단일 문서 검색 엔진
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: SentenceChunker,
    config: EngineConfig,
    index_factory: IndexFactory,
    current: RwLock<Option<Arc<Generation>>>,
    build_lock: Mutex<()>,
    indexing: AtomicBool,
}

impl RetrievalEngine {
    /// 임베딩 프로바이더와 설정으로 생성
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let chunker = SentenceChunker::new(config.chunk)?;

        Ok(Self {
            embedder,
            chunker,
            config,
            index_factory: Arc::new(|dimension, rows| {
                Box::new(FlatIndex::with_capacity(dimension, rows))
            }),
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            indexing: AtomicBool::new(false),
        })
    }

    /// 벡터 인덱스 구현 교체
    pub fn with_index_factory(mut self, factory: IndexFactory) -> Self {
        self.index_factory = factory;
        self
    }

    /// 엔진 설정
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 문서 인덱싱 (전체 교체)
    ///
    /// 청킹 → 임베딩 → 새 인덱스 구성이 모두 성공해야 현재 세대를 교체합니다.
    /// 실패하면 이전 상태(이전 문서 또는 미초기화)가 그대로 유지됩니다.
    pub async fn build_index(&self, document_text: &str) -> Result<BuildSummary> {
        let _build = self.build_lock.lock().await;
        let _indexing = IndexingFlag::raise(&self.indexing);
        let started = Instant::now();

        let chunks = self.chunker.split(document_text);
        if chunks.is_empty() {
            tracing::warn!(
                "No chunks produced from document ({} chars)",
                document_text.chars().count()
            );
            return Err(RagError::EmptyDocument);
        }

        tracing::info!("Embedding {} chunks with {}", chunks.len(), self.embedder.name());
        let vectors = self.embed_chunks(&chunks).await?;

        let dimension = self.embedder.dimension();
        let mut index = (self.index_factory)(dimension, vectors.len());
        index.add(&vectors)?;

        let generation = Generation {
            document_id: Uuid::new_v4(),
            indexed_at: Utc::now(),
            text_length: document_text.chars().count(),
            chunks,
            index,
        };
        if let Err(e) = generation.check_alignment() {
            tracing::error!("Refusing to commit index: {}", e);
            return Err(e);
        }

        let summary = BuildSummary {
            document_id: generation.document_id,
            chunk_count: generation.chunks.len(),
            text_length: generation.text_length,
            dimension,
            elapsed_ms: started.elapsed().as_millis(),
        };

        *self.current.write().await = Some(Arc::new(generation));

        tracing::info!(
            "Indexed document {} (chunks={}, chars={}, {}ms)",
            summary.document_id,
            summary.chunk_count,
            summary.text_length,
            summary.elapsed_ms
        );

        Ok(summary)
    }

    /// 질의와 가장 가까운 청크 검색
    ///
    /// 결과는 유사도 내림차순이며 최대 `k`건입니다.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let generation = self.snapshot().await.ok_or(RagError::NotReady)?;

        if k == 0 || generation.index.is_empty() {
            return Ok(vec![]);
        }

        let query_vector = self.embed_one(query).await?;

        if let Err(e) = generation.check_alignment() {
            tracing::error!("Refusing to serve results: {}", e);
            return Err(e);
        }

        let neighbors = generation.index.search(&query_vector, k)?;

        let results: Vec<RetrievedChunk> = neighbors
            .into_iter()
            .filter_map(|neighbor| match generation.chunks.get(neighbor.row_id) {
                Some(chunk) => Some(RetrievedChunk {
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                    start_offset: chunk.start_offset,
                    end_offset: chunk.end_offset,
                    page_number: chunk.page_number,
                    similarity: neighbor.similarity(),
                }),
                None => {
                    tracing::warn!(
                        "Dropping out-of-range row {} (chunks={})",
                        neighbor.row_id,
                        generation.chunks.len()
                    );
                    None
                }
            })
            .take(k)
            .collect();

        tracing::debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// 기본 `k`로 검색
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve(query, self.config.default_top_k).await
    }

    /// 인덱싱된 문서가 있는지
    pub async fn has_document(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// 현재 문서의 청크 수
    pub async fn chunk_count(&self) -> usize {
        self.current
            .read()
            .await
            .as_ref()
            .map(|g| g.chunks.len())
            .unwrap_or(0)
    }

    /// 현재 청크 목록 복사본
    pub async fn chunks(&self) -> Vec<Chunk> {
        self.snapshot()
            .await
            .map(|g| g.chunks.clone())
            .unwrap_or_default()
    }

    /// 현재 문서 제거 (미초기화 상태로)
    pub async fn clear(&self) {
        let _build = self.build_lock.lock().await;
        if self.current.write().await.take().is_some() {
            tracing::info!("Cleared indexed document");
        }
    }

    /// 엔진 상태
    ///
    /// `Indexing`은 `build_index` 실행 중에만 보고됩니다 (`clear`는 해당 없음).
    pub async fn status(&self) -> EngineStatus {
        if self.indexing.load(Ordering::Acquire) {
            return EngineStatus::Indexing;
        }
        if self.has_document().await {
            EngineStatus::Ready
        } else {
            EngineStatus::Uninitialized
        }
    }

    /// 엔진 통계
    pub async fn stats(&self) -> EngineStats {
        let status = self.status().await;
        let generation = self.snapshot().await;

        EngineStats {
            status,
            chunk_count: generation.as_ref().map(|g| g.chunks.len()).unwrap_or(0),
            dimension: self.embedder.dimension(),
            embedder: self.embedder.name().to_string(),
            document_id: generation.as_ref().map(|g| g.document_id),
            indexed_at: generation.as_ref().map(|g| g.indexed_at),
            text_length: generation.as_ref().map(|g| g.text_length).unwrap_or(0),
            sample_chunk: generation
                .as_ref()
                .and_then(|g| g.chunks.first())
                .map(|c| c.text.chars().take(200).collect()),
        }
    }

    /// 검색 결과를 LLM 컨텍스트로 결합 (줄바꿈 구분)
    pub fn build_context(results: &[RetrievedChunk]) -> String {
        results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn snapshot(&self) -> Option<Arc<Generation>> {
        self.current.read().await.clone()
    }

    /// 청크 임베딩 (동시 실행, 순서 보존)
    ///
    /// 각 future가 청크 텍스트를 소유해야 `build_index` future가 `Send`가 됩니다.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let total = chunks.len();
        let texts: Vec<(usize, String)> = chunks
            .iter()
            .map(|c| (c.index, c.text.clone()))
            .collect();
        stream::iter(texts)
            .map(move |(index, text)| async move {
                tracing::debug!("Embedding chunk {}/{}", index + 1, total);
                self.embed_one(&text).await
            })
            .buffered(self.config.embed_concurrency)
            .try_collect()
            .await
    }

    /// 청크와 질의 공통 임베딩 경로 (타임아웃 + 차원 확인 + L2 정규화)
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let timeout = self.config.embed_timeout;
        let mut vector = tokio::time::timeout(timeout, self.embedder.embed(text))
            .await
            .map_err(|_| RagError::Timeout(timeout))?
            .map_err(RagError::Embedding)?;

        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

/// 청크 수와 벡터 수가 같은지 확인
fn check_alignment(chunks: usize, vectors: usize) -> Result<()> {
    if chunks != vectors {
        return Err(RagError::IndexDesynchronization { chunks, vectors });
    }
    Ok(())
}

/// 빌드 중 표시 (drop 시 해제)
struct IndexingFlag<'a>(&'a AtomicBool);

impl<'a> IndexingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for IndexingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
