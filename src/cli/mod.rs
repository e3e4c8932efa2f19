//! CLI 모듈
//!
//! lawgic CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::FileCollector;
use crate::config::{get_api_key, has_api_key, Settings};
use crate::error::LawgicError;
use crate::extractor::{extract_all, ExtractionFailure, PdfExtractor, SourceDocument};
use crate::knowledge::{IndexStore, QaPipeline, SqliteIndexStore};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "lawgic")]
#[command(version, about = "PDF 문서 질의응답 RAG 시스템", long_about = None)]
pub struct Cli {
    /// 인덱스 디렉토리 (기본: ./lawgic_index, LAWGIC_INDEX_DIR)
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF 파일 또는 폴더를 처리하여 인덱스를 새로 만듦 (기존 인덱스 교체)
    Process {
        /// PDF 파일 또는 폴더 경로
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// 인덱스된 문서에 질문
    Ask {
        /// 질문
        question: String,

        /// 답변에 사용된 청크 표시
        #[arg(long)]
        show_context: bool,
    },

    /// 질문과 관련된 청크만 검색 (모델 호출 없음)
    Search {
        /// 검색 질문
        question: String,

        /// 결과 개수
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// 대화형 질의응답 (빈 줄 또는 exit로 종료)
    Chat,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?.with_index_dir(cli.index_dir);

    match cli.command {
        Commands::Process { paths } => cmd_process(&settings, &paths).await,
        Commands::Ask {
            question,
            show_context,
        } => cmd_ask(&settings, &question, show_context).await,
        Commands::Search { question, limit } => cmd_search(&settings, &question, limit).await,
        Commands::Chat => cmd_chat(&settings).await,
        Commands::Status => cmd_status(&settings).await,
    }
}

/// API 키 확인 후 파이프라인 생성
fn build_pipeline(settings: &Settings) -> Result<QaPipeline> {
    let api_key = get_api_key()?;
    QaPipeline::from_settings(settings, api_key).context("파이프라인 초기화 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 처리 명령어 (process)
///
/// 텍스트 추출 → 청킹 → 임베딩 → 인덱스 교체
async fn cmd_process(settings: &Settings, paths: &[PathBuf]) -> Result<()> {
    let pipeline = build_pipeline(settings)?;

    let files = FileCollector::with_defaults().collect(paths)?;
    if files.is_empty() {
        bail!("처리할 PDF 문서가 없습니다. 하나 이상의 문서를 지정하세요.");
    }

    let total_size: u64 = files.iter().map(|f| f.size).sum();
    println!(
        "[*] 처리 대상: {} 문서 ({})",
        files.len(),
        format_bytes(total_size as usize)
    );

    let mut docs = Vec::with_capacity(files.len());
    let mut read_failures = Vec::new();
    for file in &files {
        match SourceDocument::from_path(&file.path).await {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                tracing::warn!("{:#}", e);
                read_failures.push(ExtractionFailure {
                    name: file.path.display().to_string(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    println!("[*] 텍스트 추출 중...");
    let mut extraction = extract_all(Arc::new(PdfExtractor), docs).await;
    extraction.failures.extend(read_failures);

    for failure in &extraction.failures {
        println!("[!] 건너뜀: {} ({})", failure.name, failure.reason);
    }

    println!("[*] 청킹 및 임베딩 생성 중...");
    let report = pipeline.process(extraction).await?;

    println!();
    println!(
        "[OK] 문서 처리 완료! 이제 질문할 수 있습니다. (문서 {}/{}, 청크 {}, {} 문자)",
        report.documents_indexed.len(),
        report.documents_total,
        report.meta.chunk_count,
        report.characters
    );
    println!("     인덱스: {}", pipeline.store().location());

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(settings: &Settings, question: &str, show_context: bool) -> Result<()> {
    let pipeline = build_pipeline(settings)?;

    println!("[*] 문서 분석 중...");
    let answer = pipeline.ask(question).await?;

    println!("\n[OK] 답변:\n");
    println!("{}", answer.text);

    if show_context {
        println!("\n[*] 참고한 청크 ({} 건):\n", answer.context.len());
        for (i, chunk) in answer.context.iter().enumerate() {
            println!(
                "{}. [유사도: {:.4}] 청크 #{}",
                i + 1,
                chunk.similarity,
                chunk.position
            );
            println!("   {}", truncate_text(&chunk.text, 200));
        }
    }

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(settings: &Settings, question: &str, limit: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(settings)?;
    let limit = limit.unwrap_or_else(|| pipeline.top_k());

    println!("[*] 검색 중: \"{}\"", question);
    let results = pipeline.retrieve_top(question, limit).await?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, chunk) in results.iter().enumerate() {
        println!(
            "{}. [유사도: {:.4}] 청크 #{}",
            i + 1,
            chunk.similarity,
            chunk.position
        );
        println!("   내용: {}", truncate_text(&chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 대화형 명령어 (chat)
///
/// 질문마다 독립적으로 답하며, 한 질문의 실패가 세션을 끝내지 않습니다.
async fn cmd_chat(settings: &Settings) -> Result<()> {
    let pipeline = build_pipeline(settings)?;

    println!("[*] 질문을 입력하세요 (빈 줄 또는 exit로 종료)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n질문> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };
        let command = line.trim();
        if command.is_empty() || command == "exit" || command == "quit" {
            break;
        }

        match pipeline.ask(&line).await {
            Ok(answer) => println!("\n{}", answer.text),
            Err(e) => println!("\n[!] {}", describe_error(&e)),
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("lawgic v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key (또는 .env)");
    }

    println!("[*] 생성 모델: {}", settings.chat_model);
    println!(
        "[*] 청킹: {} 문자 / 오버랩 {} 문자, Top-K {}",
        settings.chunk.max_characters, settings.chunk.overlap_characters, settings.top_k
    );

    let store = SqliteIndexStore::new(settings.index_path());
    println!("[*] 인덱스: {}", store.location());

    match store.meta().await {
        Ok(Some(meta)) => {
            println!(
                "[OK] 청크 {} 개 | 임베딩 {} ({}d) | {}",
                meta.chunk_count,
                meta.embedding_model,
                meta.dimension,
                meta.created_at.format("%Y-%m-%d %H:%M")
            );
            println!("     텍스트 SHA-256: {}", meta.text_digest);
        }
        Ok(None) => println!("[!] 인덱스 없음. `lawgic process <PDF>...`로 먼저 문서를 처리하세요."),
        Err(e) => println!("[!] 인덱스 읽기 실패: {:#}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 사용자에게 보여줄 오류 메시지
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<LawgicError>() {
        Some(e) => e.to_string(),
        None => format!("{:#}", err),
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
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
