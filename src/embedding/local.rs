//! 로컬 결정적 임베딩
//!
//! 네트워크 없이 동작하는 임베딩입니다.
//! 1. 텍스트를 소문자 단어 토큰으로 분리
//! 2. 토큰마다 SHA-256 시드 기반 의사난수 벡터 생성
//! 3. 어텐션 마스크 가중 평균 풀링
//! 4. L2 정규화
//!
//! 같은 단어를 공유하는 텍스트끼리 가까워지는 어휘 기반 임베딩입니다.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::knowledge::l2_normalize;

/// 기본 차원 (MiniLM 계열과 동일)
pub const LOCAL_DIMENSION: usize = 384;

/// 토큰이 하나도 없을 때 사용하는 토큰
const EMPTY_TOKEN: &str = "[EMPTY]";

/// 평균 풀링 분모 하한
const MASK_EPSILON: f32 = 1e-9;

// ============================================================================
// LocalEmbedding
// ============================================================================

/// 오프라인 임베딩 프로바이더
#[derive(Debug, Clone)]
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// 차원을 지정하여 생성
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than zero");
        }
        Ok(Self { dimension })
    }

    /// 동기 임베딩
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut tokens = tokenize(text);
        if tokens.is_empty() {
            tokens.push(EMPTY_TOKEN.to_string());
        }

        let token_vectors: Vec<Vec<f32>> = tokens
            .iter()
            .map(|t| self.token_vector(t))
            .collect();
        let mask = vec![1.0; token_vectors.len()];

        let mut pooled = mean_pool(&token_vectors, &mask, self.dimension);
        l2_normalize(&mut pooled);
        pooled
    }

    /// 토큰 벡터 (토큰 해시로 시드한 xorshift 수열, 각 성분 [-1, 1))
    fn token_vector(&self, token: &str) -> Vec<f32> {
        let digest = Sha256::digest(token.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut state = u64::from_le_bytes(seed) | 1;

        (0..self.dimension)
            .map(|_| {
                state ^= state >> 12;
                state ^= state << 25;
                state ^= state >> 27;
                let value = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
                // 상위 24비트 → [0, 1)
                ((value >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-hash-meanpool"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 소문자 영숫자 토큰 분리
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// 마스크 가중 평균 풀링
///
/// `sum(token_i * mask_i) / max(sum(mask_i), 1e-9)`
pub fn mean_pool(token_vectors: &[Vec<f32>], mask: &[f32], dimension: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dimension];
    let mut mask_sum = 0.0f32;

    for (vector, &weight) in token_vectors.iter().zip(mask.iter()) {
        mask_sum += weight;
        for (acc, value) in pooled.iter_mut().zip(vector.iter()) {
            *acc += value * weight;
        }
    }

    let denom = mask_sum.max(MASK_EPSILON);
    for value in pooled.iter_mut() {
        *value /= denom;
    }
    pooled
}

// ============================================================================
// Tests
// ============================================================================
