//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// "--- Page 3 ---" 형태의 페이지 구분 줄
fn page_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("Invalid regex")
    })
}

/// PDF에서 텍스트 추출
///
/// 페이지별로 텍스트를 추출하여 (페이지 번호, 텍스트) 튜플 벡터로 반환합니다.
/// 페이지 번호는 1부터 시작합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;
    extract_text_from_bytes(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))
}

/// 메모리의 PDF 바이트에서 텍스트 추출
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<Vec<(usize, String)>> {
    let text = pdf_extract::extract_text_from_mem(bytes).context("pdf-extract failed")?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(vec![(1, String::new())]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

/// PDF 텍스트를 페이지별로 분리
///
/// 빈 페이지(스캔 페이지 등)도 자리를 유지하므로 `i`번째 항목이 항상 `i + 1` 페이지입니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)
    if text.contains('\x0c') {
        let pages = trim_trailing_blank(
            text.split('\x0c')
                .map(|s| s.trim().to_string())
                .collect(),
        );
        if pages.len() > 1 {
            return pages;
        }
    }

    // 페이지 구분 줄
    let pattern = page_marker();
    if pattern.is_match(text) {
        let mut segments = pattern.split(text).map(|s| s.trim().to_string());
        // 첫 구분 줄 앞의 머리말은 비어 있을 때만 버림
        let mut pages: Vec<String> = match segments.next() {
            Some(head) if !head.is_empty() => vec![head],
            _ => vec![],
        };
        pages.extend(segments);
        let pages = trim_trailing_blank(pages);

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.trim().to_string()]
}

/// 마지막 페이지 뒤의 빈 항목 제거
fn trim_trailing_blank(mut pages: Vec<String>) -> Vec<String> {
    while pages.len() > 1 && pages.last().is_some_and(|p| p.is_empty()) {
        pages.pop();
    }
    pages
}

// ============================================================================
// Tests
// ============================================================================
