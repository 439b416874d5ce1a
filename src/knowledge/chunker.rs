//! Text Chunking Module
//!
//! 문장 경계를 인식하는 오버랩 청커입니다.
//! 문자 수 기준으로 자르되, 청크 후반부에 마침표나 줄바꿈이 있으면 그 위치에서 끊습니다.

use crate::error::{RagError, Result};

/// 페이지 구분 문자 (폼피드)
pub const PAGE_BREAK: char = '\x0c';

/// 페이지 구분이 없을 때 한 페이지로 추정하는 청크 수
const CHUNKS_PER_PAGE: usize = 5;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// 설정 생성 (검증 포함)
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// 긴 문맥용 설정
    pub fn for_long_context() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }

    /// 빠른 인덱싱용 설정 (오버랩 없음)
    pub fn for_fast() -> Self {
        Self {
            chunk_size: 500,
            overlap: 0,
        }
    }

    /// 설정 검증
    ///
    /// `overlap >= chunk_size`이면 커서가 전진하지 못하므로 치명적 설정 오류입니다.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 문서 청크
///
/// `index`는 청크 목록 내 위치이자 벡터 인덱스의 행 번호입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0부터 시작하는 청크 번호
    pub index: usize,
    /// 앞뒤 공백이 제거된 청크 텍스트
    pub text: String,
    /// 시작 오프셋 (문자 단위, 포함)
    pub start_offset: usize,
    /// 끝 오프셋 (문자 단위, 미포함)
    pub end_offset: usize,
    /// 추정 페이지 번호 (1부터 시작)
    pub page_number: usize,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn split(&self, text: &str) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문장 경계 인식 청커
///
/// - 문자 수 기준 고정 크기 윈도우
/// - 윈도우 후반부의 `.` 또는 줄바꿈에서 끊기
/// - 인접 청크 간 `overlap` 문자 중첩
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 현재 설정
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 청크 끝 위치 결정
    ///
    /// `[cursor, proposed)` 안에서 마지막 경계 문자를 찾아, 그 위치가 청크 중간을 넘고
    /// 다음 커서가 앞으로 전진할 수 있을 때만 경계 바로 뒤를 끝으로 사용합니다.
    fn find_end(&self, chars: &[char], cursor: usize) -> usize {
        let proposed = (cursor + self.config.chunk_size).min(chars.len());
        if proposed >= chars.len() {
            return chars.len();
        }

        let candidate = chars[cursor..proposed]
            .iter()
            .rposition(|&c| c == '.' || c == '\n')
            .map(|p| cursor + p);

        match candidate {
            // candidate > cursor + chunk_size * 0.5
            Some(pos) if 2 * pos > 2 * cursor + self.config.chunk_size => {
                let end = pos + 1;
                if end > cursor + self.config.overlap {
                    end
                } else {
                    proposed
                }
            }
            _ => proposed,
        }
    }
}

impl Chunker for SentenceChunker {
    fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return vec![];
        }

        let breaks = page_breaks(&chars);
        let mut chunks = Vec::new();
        let mut cursor = 0;

        while cursor < chars.len() {
            let end = self.find_end(&chars, cursor);

            let raw: String = chars[cursor..end].iter().collect();
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let leading = raw.chars().take_while(|c| c.is_whitespace()).count();
                let index = chunks.len();
                chunks.push(Chunk {
                    index,
                    text: trimmed.to_string(),
                    start_offset: cursor,
                    end_offset: end,
                    page_number: page_number(&breaks, index, cursor + leading),
                });
            }

            if end >= chars.len() {
                break;
            }
            cursor = end - self.config.overlap;
        }

        tracing::debug!(
            "Split {} chars into {} chunks (size={}, overlap={})",
            chars.len(),
            chunks.len(),
            self.config.chunk_size,
            self.config.overlap
        );

        chunks
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 폼피드 위치 목록 (문자 오프셋)
fn page_breaks(chars: &[char]) -> Vec<usize> {
    chars
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == PAGE_BREAK)
        .map(|(i, _)| i)
        .collect()
}

/// 페이지 번호 계산
///
/// 텍스트에 폼피드가 있으면 청크 첫 글자(`anchor`) 앞의 폼피드 개수로 계산하고,
/// 없으면 `index / 5 + 1` 추정치를 사용합니다.
fn page_number(breaks: &[usize], index: usize, anchor: usize) -> usize {
    if breaks.is_empty() {
        index / CHUNKS_PER_PAGE + 1
    } else {
        breaks.partition_point(|&b| b < anchor) + 1
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(chunk_size: usize, overlap: usize) -> SentenceChunker {
        SentenceChunker::new(ChunkConfig {
            chunk_size,
            overlap,
        })
        .expect("valid config")
    }

    #[test]
    fn test_chunker_empty() {
        let chunks = chunker(500, 50).split("");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunker_whitespace_only() {
        let chunks = chunker(500, 50).split("   \n\t  ");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunks = chunker(500, 50).split("  Short paragraph.  ");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short paragraph.");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 20);
        assert_eq!(chunks[0].page_number, 1);
    }

    #[test]
    fn test_chunker_1200_chars_without_boundaries() {
        let text = "a".repeat(1200);
        let chunks = chunker(500, 50).split(&text);

        let ranges: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.start_offset, c.end_offset))
            .collect();
        assert_eq!(ranges, vec![(0, 500), (450, 950), (900, 1200)]);
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_chunker_1200_chars_of_sentences() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text: String = sentence.chars().cycle().take(1200).collect();
        let chunks = chunker(500, 50).split(&text);
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_chunker_breaks_after_midpoint() {
        let text = format!("{}.{}", "x".repeat(300), "y".repeat(400));
        let chunks = chunker(500, 50).split(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 301));
        assert!(chunks[0].text.ends_with('.'));
        assert_eq!((chunks[1].start_offset, chunks[1].end_offset), (251, 701));
    }

    #[test]
    fn test_chunker_ignores_boundary_before_midpoint() {
        let text = format!("{}.{}", "x".repeat(100), "y".repeat(600));
        let chunks = chunker(500, 50).split(&text);

        assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 500));
        assert_eq!((chunks[1].start_offset, chunks[1].end_offset), (450, 701));
    }

    #[test]
    fn test_chunker_newline_boundary() {
        let text = format!("{}\n{}", "x".repeat(400), "y".repeat(400));
        let chunks = chunker(500, 50).split(&text);
        assert_eq!(chunks[0].end_offset, 401);
        assert_eq!(chunks[0].text, "x".repeat(400));
    }

    #[test]
    fn test_chunker_large_overlap_still_advances() {
        let text = format!("{}.{}", "x".repeat(60), "y".repeat(200));
        let chunks = chunker(100, 80).split(&text);

        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(261));
    }

    #[test]
    fn test_chunker_counts_characters_not_bytes() {
        let text = "가".repeat(30);
        let chunks = chunker(10, 2).split(&text);

        assert_eq!(chunks[0].text.chars().count(), 10);
        assert_eq!((chunks[1].start_offset, chunks[1].end_offset), (8, 18));
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(30));
    }

    #[test]
    fn test_page_number_heuristic() {
        let text = "b".repeat(100);
        let chunks = chunker(10, 0).split(&text);

        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[0].page_number, 1);
        assert_eq!(chunks[4].page_number, 1);
        assert_eq!(chunks[5].page_number, 2);
        assert_eq!(chunks[9].page_number, 2);
    }

    #[test]
    fn test_page_number_from_page_breaks() {
        let text = format!("{}\x0c{}\x0c{}", "a".repeat(20), "b".repeat(20), "c".repeat(20));
        let chunks = chunker(20, 0).split(&text);

        // 0..20 a, 20..40 \x0c + b*19, 40..60 b + \x0c + c*18, 60..62 cc
        let pages: Vec<usize> = chunks.iter().map(|c| c.page_number).collect();
        assert_eq!(pages, vec![1, 2, 2, 3]);
        assert_eq!(chunks[1].text, "b".repeat(19));
        assert_eq!(chunks[3].text, "cc");
    }

    #[test]
    fn test_chunk_starting_on_page_break_belongs_to_next_page() {
        let text = format!("{}\x0c{}", "a".repeat(20), "b".repeat(20));
        let chunks = chunker(20, 0).split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].start_offset, 20);
        assert_eq!(chunks[1].text, "b".repeat(19));
        let pages: Vec<usize> = chunks.iter().map(|c| c.page_number).collect();
        assert_eq!(pages, vec![1, 2, 2]);
    }

    #[test]
    fn test_blank_page_keeps_later_page_numbers() {
        let text = format!("{}\x0c\x0c{}", "a".repeat(10), "c".repeat(10));
        let chunks = chunker(11, 0).split(&text);
        let pages: Vec<usize> = chunks.iter().map(|c| c.page_number).collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::new(500, 50).is_ok());
        assert!(matches!(
            ChunkConfig::new(50, 50),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            ChunkConfig::new(0, 0),
            Err(RagError::Configuration(_))
        ));
        assert!(SentenceChunker::new(ChunkConfig {
            chunk_size: 10,
            overlap: 20
        })
        .is_err());
    }

    #[test]
    fn test_config_presets() {
        let default = ChunkConfig::default();
        assert_eq!(default.chunk_size, 500);
        assert_eq!(default.overlap, 50);

        let long = ChunkConfig::for_long_context();
        assert!(long.validate().is_ok());
        assert_eq!(long.overlap, 200);

        assert_eq!(ChunkConfig::for_fast().overlap, 0);
    }

    proptest! {
        /// 공백이 아닌 모든 문자는 적어도 하나의 청크 범위에 포함된다
        #[test]
        fn proptest_chunks_cover_text(
            text in "[a-z .\n]{0,400}",
            chunk_size in 1usize..120,
            overlap_ratio in 0.0f64..1.0,
        ) {
            let overlap = ((chunk_size as f64) * overlap_ratio) as usize;
            let overlap = overlap.min(chunk_size - 1);
            let chars: Vec<char> = text.chars().collect();
            let chunks = chunker(chunk_size, overlap).split(&text);

            for (i, c) in chars.iter().enumerate() {
                if c.is_whitespace() {
                    continue;
                }
                prop_assert!(
                    chunks.iter().any(|ch| ch.start_offset <= i && i < ch.end_offset),
                    "char {} not covered", i
                );
            }

            for chunk in &chunks {
                prop_assert!(chunk.start_offset < chunk.end_offset);
                prop_assert!(!chunk.text.is_empty());
                let slice: String = chars[chunk.start_offset..chunk.end_offset].iter().collect();
                prop_assert_eq!(slice.trim(), chunk.text.as_str());
                prop_assert!(chunk.end_offset - chunk.start_offset <= chunk_size);
            }
        }

        /// overlap < chunk_size이면 항상 유한한 수의 청크로 끝난다
        #[test]
        fn proptest_split_terminates(
            len in 0usize..2000,
            chunk_size in 1usize..600,
            overlap in 0usize..600,
        ) {
            prop_assume!(overlap < chunk_size);
            let text: String = "ab. cd\nef ".chars().cycle().take(len).collect();
            let chunks = chunker(chunk_size, overlap).split(&text);

            prop_assert!(chunks.len() <= len.max(1));
            for pair in chunks.windows(2) {
                prop_assert!(pair[1].start_offset > pair[0].start_offset);
            }
        }
    }
}
