//! 콘텐츠 추출 모듈
//!
//! 업로드된 파일에서 검색 엔진에 넣을 텍스트를 추출합니다.
//! - 텍스트 파일: 직접 읽기
//! - PDF 파일: pdf-extract로 페이지별 추출 후 폼피드로 연결

pub mod pdf;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::knowledge::PAGE_BREAK;

/// 최대 문서 크기 (50MB)
pub const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

// ============================================================================
// Source Type
// ============================================================================

/// 지원하는 문서 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// 텍스트 파일 (마크다운 등)
    Text,
    /// PDF 파일
    Pdf,
}

impl SourceType {
    /// 확장자로 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" | "text" | "rst" | "csv" => Some(SourceType::Text),
            "pdf" => Some(SourceType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Extracted Document
// ============================================================================

/// 추출된 문서
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 추출된 텍스트 (페이지 사이는 폼피드)
    pub text: String,
    /// 원본 타입
    pub source_type: SourceType,
    /// 페이지 수 (텍스트 파일은 1)
    pub page_count: usize,
}

// ============================================================================
// Extraction
// ============================================================================

/// 파일에서 문서 텍스트 추출
pub async fn extract_document(path: &Path) -> Result<ExtractedDocument> {
    let source_type = SourceType::from_path(path)
        .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {:?}", path))?;

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat file: {:?}", path))?;
    if metadata.len() > MAX_DOCUMENT_BYTES {
        bail!(
            "File too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_DOCUMENT_BYTES
        );
    }

    tracing::info!("Extracting text from {:?}", path);

    let document = match source_type {
        SourceType::Text => extract_text_file(path).await?,
        SourceType::Pdf => extract_pdf_file(path.to_path_buf()).await?,
    };

    tracing::info!(
        "Total text length: {} characters ({} pages)",
        document.text.chars().count(),
        document.page_count
    );

    Ok(document)
}

/// 텍스트 파일에서 추출
async fn extract_text_file(path: &Path) -> Result<ExtractedDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read text file: {:?}", path))?;

    Ok(ExtractedDocument {
        text,
        source_type: SourceType::Text,
        page_count: 1,
    })
}

/// PDF 파일에서 추출
async fn extract_pdf_file(path: PathBuf) -> Result<ExtractedDocument> {
    // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
    let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
        .await
        .context("PDF extraction task failed")??;

    let page_count = pages.len();
    let separator = PAGE_BREAK.to_string();
    let text = pages
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(&separator);

    Ok(ExtractedDocument {
        text,
        source_type: SourceType::Pdf,
        page_count,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_type_from_path() {
        assert_eq!(
            SourceType::from_path(Path::new("report.PDF")),
            Some(SourceType::Pdf)
        );
        assert_eq!(
            SourceType::from_path(Path::new("notes.md")),
            Some(SourceType::Text)
        );
        assert_eq!(SourceType::from_path(Path::new("image.png")), None);
        assert_eq!(SourceType::from_path(Path::new("README")), None);
    }

    #[tokio::test]
    async fn test_extract_text_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("tempfile");
        write!(file, "First line.\nSecond line.").expect("write");

        let document = extract_document(file.path()).await.expect("extract");
        assert_eq!(document.source_type, SourceType::Text);
        assert_eq!(document.page_count, 1);
        assert_eq!(document.text, "First line.\nSecond line.");
    }

    #[tokio::test]
    async fn test_extract_unsupported_type() {
        let file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("tempfile");
        let err = extract_document(file.path()).await.err();
        assert!(err.is_some_and(|e| e.to_string().contains("Unsupported")));
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let result = extract_document(Path::new("/nonexistent/dir/doc.txt")).await;
        assert!(result.is_err());
    }
}
