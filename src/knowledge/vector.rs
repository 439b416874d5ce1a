//! Vector Index - 벡터 검색 트레이트 및 유틸리티
//!
//! 거리 계산, 정규화, 거리 → 유사도 변환을 제공합니다.

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 검색 결과 한 건
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 벡터 인덱스 행 번호 (= 청크 번호)
    pub row_id: usize,
    /// 제곱 유클리드 거리
    pub distance: f32,
}

impl Neighbor {
    /// 랭킹용 유사도 스코어 (`1 - distance`)
    pub fn similarity(&self) -> f32 {
        distance_to_similarity(self.distance)
    }
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트
///
/// 추가 전용(append-only) 인덱스의 공통 인터페이스입니다.
/// 행 번호는 추가된 순서대로 현재 크기부터 부여됩니다.
pub trait VectorIndex: Send + Sync {
    /// 벡터 배치 추가
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// 최근접 이웃 검색 (거리 오름차순, 최대 `min(k, len)`건)
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// 저장된 벡터 수
    fn len(&self) -> usize;

    /// 비어있는지 여부
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 벡터 차원
    fn dimension(&self) -> usize;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 제곱 유클리드 거리
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// 거리 → 유사도 변환
///
/// 단위 벡터에서 `d² = 2(1 - cosθ)`이므로 `1 - d²`는 코사인 유사도가 아니라
/// 단조 관계의 랭킹 스코어입니다. 상대 순위 비교와 표시에만 사용합니다.
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 - distance
}

/// L2 정규화 (제자리)
///
/// 영벡터는 그대로 둡니다.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|x| (*x as f64) * (*x as f64))
        .sum::<f64>()
        .sqrt() as f32;

    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// L2 노름
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_euclidean_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert_eq!(squared_euclidean(&a, &a), 0.0);
    }

    #[test]
    fn test_squared_euclidean_orthogonal_unit() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((squared_euclidean(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_squared_euclidean_opposite_unit() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((squared_euclidean(&a, &b) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_is_monotonic() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert!(distance_to_similarity(0.5) > distance_to_similarity(1.5));
        // 직교 단위 벡터: 코사인 0이지만 스코어는 -1
        assert!((distance_to_similarity(2.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_neighbor_similarity() {
        let n = Neighbor {
            row_id: 2,
            distance: 0.25,
        };
        assert!((n.similarity() - 0.75).abs() < 1e-6);
    }
}
