//! CLI 모듈
//!
//! pdf-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::answer::{get_pplx_api_key, DocumentQa, PerplexityAnswer};
use crate::embedding::{create_embedder, EmbedderKind};
use crate::extractor::extract_document;
use crate::knowledge::{
    BuildSummary, ChunkConfig, EngineConfig, EngineStatus, RetrievalEngine, RetrievedChunk,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(version, about = "PDF 문서 질의응답 (RAG)", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: EngineOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// 엔진 공통 옵션
#[derive(Args, Debug, Clone)]
pub struct EngineOptions {
    /// 청킹 프리셋 (default: 500/50, long: 1000/200, fast: 500/0)
    #[arg(long, global = true, env = "PDF_RAG_PRESET", value_enum, default_value = "default")]
    pub preset: ChunkPreset,

    /// 청크 크기 (문자 수, 프리셋 값 덮어쓰기)
    #[arg(long, global = true, env = "PDF_RAG_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// 청크 간 오버랩 (문자 수, 프리셋 값 덮어쓰기)
    #[arg(long, global = true, env = "PDF_RAG_OVERLAP")]
    pub overlap: Option<usize>,

    /// 임베딩 백엔드 (local, gemini)
    #[arg(long, global = true, env = "PDF_RAG_EMBEDDER", default_value = "local")]
    pub embedder: EmbedderKind,

    /// 임베딩 차원 (미지정 시 백엔드 기본값)
    #[arg(long, global = true, env = "PDF_RAG_DIMENSION")]
    pub dimension: Option<usize>,

    /// 임베딩 호출 타임아웃 (초)
    #[arg(long, global = true, env = "PDF_RAG_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// 동시 임베딩 요청 수
    #[arg(long, global = true, env = "PDF_RAG_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,
}

/// 청킹 프리셋
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPreset {
    #[default]
    Default,
    /// 긴 문맥
    Long,
    /// 오버랩 없음
    Fast,
}

impl ChunkPreset {
    fn config(self) -> ChunkConfig {
        match self {
            ChunkPreset::Default => ChunkConfig::default(),
            ChunkPreset::Long => ChunkConfig::for_long_context(),
            ChunkPreset::Fast => ChunkConfig::for_fast(),
        }
    }
}

impl EngineOptions {
    /// 엔진 설정으로 변환
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let preset = self.preset.config();
        let chunk = ChunkConfig::new(
            self.chunk_size.unwrap_or(preset.chunk_size),
            self.overlap.unwrap_or(preset.overlap),
        )
        .context("청킹 설정 오류")?;

        Ok(EngineConfig {
            chunk,
            embed_timeout: Duration::from_secs(self.timeout_secs),
            embed_concurrency: self.concurrency,
            ..Default::default()
        })
    }

    /// 임베딩 초기화 후 엔진 생성
    pub fn build_engine(&self) -> Result<Arc<RetrievalEngine>> {
        let config = self.engine_config()?;
        let embedder =
            create_embedder(self.embedder, self.dimension).context("임베딩 초기화 실패")?;
        let engine = RetrievalEngine::new(embedder, config).context("엔진 설정 오류")?;
        Ok(Arc::new(engine))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서를 인덱싱하고 관련 구절 검색
    Search {
        /// 문서 경로 (.pdf, .txt, .md)
        file: PathBuf,

        /// 검색 쿼리
        query: String,

        /// 결과 개수 (미지정 시 기본값 3)
        #[arg(short, long)]
        k: Option<usize>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 문서에 대해 질문 (LLM 답변)
    Ask {
        /// 문서 경로
        file: PathBuf,

        /// 질문
        question: String,

        /// 근거 청크 개수
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 대화형 질의응답
    Chat {
        /// 처음 불러올 문서
        file: Option<PathBuf>,

        /// 근거 청크 개수
        #[arg(short, long, default_value = "5")]
        k: usize,
    },

    /// 문서 청킹 결과 확인
    Inspect {
        /// 문서 경로
        file: PathBuf,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let options = cli.options;
    match cli.command {
        Commands::Search {
            file,
            query,
            k,
            json,
        } => cmd_search(&options, &file, &query, k, json).await,
        Commands::Ask {
            file,
            question,
            k,
            json,
        } => cmd_ask(&options, &file, &question, k, json).await,
        Commands::Chat { file, k } => cmd_chat(&options, file, k).await,
        Commands::Inspect { file, json } => cmd_inspect(&options, &file, json).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 검색 명령어 (search)
async fn cmd_search(
    options: &EngineOptions,
    file: &Path,
    query: &str,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let engine = options.build_engine()?;
    load_document(&engine, file).await?;

    let results = match k {
        Some(k) => engine.retrieve(query, k).await,
        None => engine.retrieve_default(query).await,
    }
    .context("검색 실패")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    print_results(&results);
    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(
    options: &EngineOptions,
    file: &Path,
    question: &str,
    k: usize,
    json: bool,
) -> Result<()> {
    // 문서 처리 전에 키 확인
    let provider = Arc::new(PerplexityAnswer::from_env()?);

    let engine = options.build_engine()?;
    load_document(&engine, file).await?;

    let qa = DocumentQa::new(engine, provider);
    let response = qa.ask(question, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("\n{}\n", response.answer);
    println!(
        "[*] 모델: {} | 근거 {} / {} 청크",
        response.model, response.sources.chunks_used, response.sources.total_chunks
    );
    for detail in &response.sources.chunk_details {
        println!(
            "  {}. [p.{}] [점수: {}] {}",
            detail.rank,
            detail.page,
            detail.relevance_score,
            truncate_text(&detail.preview, 80)
        );
    }

    Ok(())
}

/// 대화형 명령어 (chat)
///
/// `:load <파일>`, `:status`, `:clear`, `:quit`
async fn cmd_chat(options: &EngineOptions, file: Option<PathBuf>, k: usize) -> Result<()> {
    let engine = options.build_engine()?;

    let qa = match get_pplx_api_key() {
        Ok(key) => Some(DocumentQa::new(
            Arc::clone(&engine),
            Arc::new(PerplexityAnswer::new(key)?),
        )),
        Err(_) => {
            println!("[!] PPLX_API_KEY 미설정: 검색 결과만 표시합니다.");
            None
        }
    };

    if let Some(ref path) = file {
        if let Err(e) = load_document(&engine, path).await {
            println!("[!] {:#}", e);
        }
    }

    println!("[*] 질문을 입력하세요 (:load <파일>, :status, :clear, :quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ChatInput::parse(line) {
            ChatInput::Quit => break,
            ChatInput::Load(path) => {
                if let Err(e) = load_document(&engine, Path::new(path)).await {
                    println!("[!] {:#}", e);
                }
            }
            ChatInput::Status => print_status(&engine).await,
            ChatInput::Clear => {
                engine.clear().await;
                println!("[OK] 문서를 비웠습니다.");
            }
            ChatInput::Unknown(command) => println!("[!] 알 수 없는 명령: {}", command),
            ChatInput::Question(question) => {
                let outcome = match qa {
                    Some(ref qa) => qa.ask(question, k).await.map(|response| {
                        println!("\n{}\n", response.answer);
                        print_results(&response.supporting_chunks);
                    }),
                    None => engine
                        .retrieve(question, k)
                        .await
                        .map(|results| print_results(&results))
                        .map_err(anyhow::Error::from),
                };
                if let Err(e) = outcome {
                    println!("[!] {:#}", e);
                }
            }
        }
    }

    Ok(())
}

/// 청킹 확인 명령어 (inspect)
async fn cmd_inspect(options: &EngineOptions, file: &Path, json: bool) -> Result<()> {
    let engine = options.build_engine()?;
    let summary = load_document(&engine, file).await?;
    let stats = engine.stats().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let file_size = tokio::fs::metadata(file).await.map(|m| m.len()).unwrap_or(0);
    let chunks = engine.chunks().await;
    let pages = chunks.last().map(|c| c.page_number).unwrap_or(0);
    let avg_len = if chunks.is_empty() {
        0
    } else {
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len()
    };

    println!("[OK] 문서: {}", file.display());
    println!("     파일 크기: {}", format_bytes(file_size as usize));
    println!("     텍스트: {} chars", summary.text_length);
    println!(
        "     청크: {} (평균 {} chars, 추정 {} 페이지)",
        summary.chunk_count, avg_len, pages
    );
    println!("     임베딩: {} ({}차원)", stats.embedder, stats.dimension);
    if let Some(sample) = stats.sample_chunk {
        println!("     샘플: {}", truncate_text(&sample, 120));
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 대화형 입력
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Load(&'a str),
    Status,
    Clear,
    Unknown(&'a str),
    Question(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        let Some(command) = line.strip_prefix(':') else {
            return ChatInput::Question(line);
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "q" | "quit" | "exit" => ChatInput::Quit,
            "load" if !arg.is_empty() => ChatInput::Load(arg),
            "status" => ChatInput::Status,
            "clear" => ChatInput::Clear,
            _ => ChatInput::Unknown(line),
        }
    }
}

/// 문서 추출 후 인덱싱
async fn load_document(engine: &RetrievalEngine, path: &Path) -> Result<BuildSummary> {
    if !path.exists() {
        bail!("파일을 찾을 수 없습니다: {}", path.display());
    }

    println!("[*] 문서 처리 중: {}", path.display());

    let document = extract_document(path)
        .await
        .with_context(|| format!("텍스트 추출 실패: {}", path.display()))?;

    let summary = engine
        .build_index(&document.text)
        .await
        .context("인덱스 생성 실패")?;

    println!(
        "[OK] {} 청크 인덱싱 완료 ({} chars, {} pages, {}ms)",
        summary.chunk_count, summary.text_length, document.page_count, summary.elapsed_ms
    );

    Ok(summary)
}

/// 엔진 상태 출력
async fn print_status(engine: &RetrievalEngine) {
    let stats = engine.stats().await;
    let status = match stats.status {
        EngineStatus::Uninitialized => "문서 없음",
        EngineStatus::Indexing => "인덱싱 중",
        EngineStatus::Ready => "준비됨",
    };

    println!("[*] 상태: {}", status);
    println!("    청크: {}", stats.chunk_count);
    println!("    임베딩: {} ({}차원)", stats.embedder, stats.dimension);
    if let Some(indexed_at) = stats.indexed_at {
        println!("    인덱싱 시각: {}", indexed_at.format("%Y-%m-%d %H:%M:%S"));
    }
}

/// 검색 결과 출력
fn print_results(results: &[RetrievedChunk]) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] 청크 #{} (p.{}, {}..{})",
            i + 1,
            result.similarity,
            result.chunk_index,
            result.page_number,
            result.start_offset,
            result.end_offset
        );
        println!("   내용: {}", truncate_text(&result.text, 200));
        println!();
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace(['\n', '\x0c'], " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
        assert_eq!(truncate_text("page\x0cbreak", 20), "page break");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        assert_eq!(truncate_text(korean, 5), "안녕하세요...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_chat_input_parse() {
        assert_eq!(ChatInput::parse(":q"), ChatInput::Quit);
        assert_eq!(ChatInput::parse(":load  docs/a.pdf "), ChatInput::Load("docs/a.pdf"));
        assert_eq!(ChatInput::parse(":load"), ChatInput::Unknown(":load"));
        assert_eq!(ChatInput::parse(":status"), ChatInput::Status);
        assert_eq!(ChatInput::parse(":clear"), ChatInput::Clear);
        assert_eq!(
            ChatInput::parse("What is the total?"),
            ChatInput::Question("What is the total?")
        );
    }

    #[test]
    fn test_cli_parses_options() {
        let cli = Cli::try_parse_from([
            "pdf-rag",
            "search",
            "doc.pdf",
            "revenue",
            "-k",
            "7",
            "--chunk-size",
            "800",
            "--overlap",
            "100",
            "--embedder",
            "gemini",
        ])
        .expect("parse");

        assert_eq!(cli.options.chunk_size, Some(800));
        assert_eq!(cli.options.overlap, Some(100));
        assert_eq!(cli.options.embedder, EmbedderKind::Gemini);
        match cli.command {
            Commands::Search { k, ref query, .. } => {
                assert_eq!(k, Some(7));
                assert_eq!(query, "revenue");
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_engine_config_from_options() {
        let cli = Cli::try_parse_from(["pdf-rag", "inspect", "doc.txt", "--timeout-secs", "5"])
            .expect("parse");
        let config = cli.options.engine_config().expect("config");
        assert_eq!(config.embed_timeout, Duration::from_secs(5));
        assert_eq!(config.chunk.chunk_size, 500);
        assert_eq!(config.chunk.overlap, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_preset_with_override() {
        let cli = Cli::try_parse_from(["pdf-rag", "inspect", "doc.txt", "--preset", "long"])
            .expect("parse");
        let chunk = cli.options.engine_config().expect("config").chunk;
        assert_eq!((chunk.chunk_size, chunk.overlap), (1000, 200));

        let cli = Cli::try_parse_from([
            "pdf-rag", "inspect", "doc.txt", "--preset", "fast", "--chunk-size", "300",
        ])
        .expect("parse");
        let chunk = cli.options.engine_config().expect("config").chunk;
        assert_eq!((chunk.chunk_size, chunk.overlap), (300, 0));
    }

    #[test]
    fn test_invalid_overlap_rejected_by_engine() {
        let cli = Cli::try_parse_from(["pdf-rag", "inspect", "doc.txt", "--overlap", "500"])
            .expect("parse");
        assert!(cli.options.build_engine().is_err());
    }

    #[tokio::test]
    async fn test_load_document_from_text_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Quarterly results were strong.\nCosts fell.").expect("write");

        let cli = Cli::try_parse_from(["pdf-rag", "inspect", "notes.txt"]).expect("parse");
        let engine = cli.options.build_engine().expect("engine");

        let summary = load_document(&engine, &path).await.expect("load");
        assert_eq!(summary.chunk_count, 1);
        assert!(engine.has_document().await);

        let missing = load_document(&engine, &dir.path().join("missing.txt")).await;
        assert!(missing.is_err());
        assert_eq!(engine.chunk_count().await, 1);
    }
}
