//! 콘텐츠 추출 모듈
//!
//! 업로드된 문서들에서 텍스트를 추출하여 하나의 문자열로 이어 붙입니다.
//! 읽을 수 없는 문서는 경고를 남기고 건너뜁니다 (배치 전체를 중단하지 않음).

pub mod pdf;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

pub use pdf::PdfExtractor;

// ============================================================================
// Source Document
// ============================================================================

/// 처리 요청 동안만 존재하는 문서 원본
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// 표시용 이름 (파일명)
    pub name: String,
    /// 원본 바이트
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// 파일에서 읽기
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read document: {:?}", path))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self { name, bytes })
    }
}

// ============================================================================
// Text Extractor
// ============================================================================

/// 문서 텍스트 추출 트레이트
///
/// CPU 바운드 작업이므로 동기 인터페이스입니다.
/// 호출 측(`extract_all`)이 blocking 스레드에서 실행합니다.
pub trait TextExtractor: Send + Sync {
    /// 문서 전체 텍스트 추출 (텍스트 없는 페이지는 빈 문자열)
    fn extract(&self, doc: &SourceDocument) -> Result<String>;

    /// 추출기 이름
    fn name(&self) -> &'static str;
}

/// 문서 하나의 추출 실패
#[derive(Debug, Clone)]
pub struct ExtractionFailure {
    pub name: String,
    pub reason: String,
}

/// 배치 추출 결과
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// 입력 순서대로 이어 붙인 텍스트
    pub text: String,
    /// 추출에 성공한 문서 이름
    pub extracted: Vec<String>,
    /// 건너뛴 문서
    pub failures: Vec<ExtractionFailure>,
}

impl ExtractionReport {
    /// 처리 대상 문서 수
    pub fn total(&self) -> usize {
        self.extracted.len() + self.failures.len()
    }

    /// 인덱싱할 텍스트가 있는지
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    fn record(mut self, name: String, outcome: Result<String>) -> Self {
        match outcome {
            Ok(text) => {
                tracing::debug!("Extracted {} chars from {}", text.len(), name);
                self.text.push_str(&text);
                self.extracted.push(name);
            }
            Err(e) => {
                tracing::warn!("Error reading {}: {:#}", name, e);
                self.failures.push(ExtractionFailure {
                    name,
                    reason: format!("{:#}", e),
                });
            }
        }
        self
    }
}

/// 문서 배치에서 텍스트 추출
///
/// 각 문서는 blocking 스레드에서 추출되며, 추출 라이브러리의 패닉도
/// 해당 문서의 실패로만 기록됩니다.
pub async fn extract_all(
    extractor: Arc<dyn TextExtractor>,
    docs: Vec<SourceDocument>,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for doc in docs {
        let name = doc.name.clone();
        let worker = Arc::clone(&extractor);
        let outcome = tokio::task::spawn_blocking(move || worker.extract(&doc))
            .await
            .context("Extraction task failed")
            .and_then(|r| r);

        report = report.record(name, outcome);
    }

    tracing::info!(
        "Extracted text from {}/{} documents ({} chars, extractor={})",
        report.extracted.len(),
        report.total(),
        report.text.len(),
        extractor.name()
    );

    report
}

// ============================================================================
// Tests
// ============================================================================
