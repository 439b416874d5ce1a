//! Flat Vector Index - 전수 탐색 벡터 인덱스
//!
//! 문서 하나 분량(수백 청크)의 벡터를 하나의 연속 버퍼에 저장하고
//! 선형 스캔으로 정확한 최근접 이웃을 찾습니다.

use crate::error::{RagError, Result};

use super::vector::{squared_euclidean, Neighbor, VectorIndex};

// ============================================================================
// FlatIndex
// ============================================================================

/// 플랫 L2 인덱스
///
/// 행 `i`의 벡터는 `data[i * dimension..(i + 1) * dimension]`에 있습니다.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// 차원을 지정하여 빈 인덱스 생성
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// 예상 행 수만큼 미리 할당
    pub fn with_capacity(dimension: usize, rows: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(dimension * rows),
        }
    }

    /// 행 벡터 조회
    pub fn row(&self, row_id: usize) -> Option<&[f32]> {
        let start = row_id.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        // 하나라도 차원이 틀리면 아무것도 추가하지 않음
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.dimension == 0 {
            return Ok(vec![]);
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row_id, row)| Neighbor {
                row_id,
                distance: squared_euclidean(query, row),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.row_id.cmp(&b.row_id))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Tests
// ============================================================================
