//! 질의응답 파이프라인
//!
//! 두 개의 독립된 흐름을 제공합니다.
//! - process: 추출 → 청킹 → 임베딩 → 인덱스 교체
//! - ask: 인덱스 로드 → 질문 임베딩 → Top-K 검색 → 프롬프트 → 생성
//!
//! 두 흐름은 인덱스 저장소만 공유합니다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::error::LawgicError;
use crate::extractor::{extract_all, ExtractionFailure, ExtractionReport, SourceDocument, TextExtractor};
use crate::generation::{AnswerModel, GeminiChat};

use super::chunker::{character_chunker, Chunker};
use super::prompt::build_prompt;
use super::sqlite::SqliteIndexStore;
use super::vector::{IndexMeta, IndexStore, IndexedChunk, ScoredChunk};

/// 기본 검색 청크 수
pub const DEFAULT_TOP_K: usize = crate::config::DEFAULT_TOP_K;

// ============================================================================
// Types
// ============================================================================

/// process 결과
#[derive(Debug, Clone)]
pub struct ProcessReport {
    /// 입력 문서 수
    pub documents_total: usize,
    /// 텍스트를 추출한 문서
    pub documents_indexed: Vec<String>,
    /// 건너뛴 문서
    pub failures: Vec<ExtractionFailure>,
    /// 인덱싱된 문자 수
    pub characters: usize,
    /// 새 인덱스 메타데이터
    pub meta: IndexMeta,
}

/// ask 결과
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    /// 모델 응답 (가공하지 않음)
    pub text: String,
    /// 프롬프트에 사용된 청크 (순위순)
    pub context: Vec<ScoredChunk>,
}

// ============================================================================
// QaPipeline
// ============================================================================

/// 검색 증강 질의응답 파이프라인
pub struct QaPipeline {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn AnswerModel>,
    chunker: Box<dyn Chunker>,
    top_k: usize,
}

impl QaPipeline {
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn AnswerModel>,
        chunker: Box<dyn Chunker>,
    ) -> Self {
        Self {
            store,
            embedder,
            model,
            chunker,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// 검색 청크 수 지정
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// 설정으로 Gemini + SQLite 파이프라인 생성
    pub fn from_settings(settings: &Settings, api_key: String) -> Result<Self> {
        let embedder = GeminiEmbedding::with_dimension(api_key.clone(), settings.embedding_dimension)
            .context("Failed to create embedder")?
            .with_retries(settings.embed_retries);
        let model = GeminiChat::new(api_key, settings.chat_model.clone())
            .context("Failed to create answer model")?;
        let chunker = character_chunker(settings.chunk.clone())?;
        let store = SqliteIndexStore::new(settings.index_path());

        Ok(Self::new(Arc::new(store), Arc::new(embedder), Arc::new(model), chunker)
            .with_top_k(settings.top_k))
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    // ------------------------------------------------------------------------
    // Process
    // ------------------------------------------------------------------------

    /// 문서 배치를 추출하여 인덱스 교체
    pub async fn process_documents(
        &self,
        extractor: Arc<dyn TextExtractor>,
        docs: Vec<SourceDocument>,
    ) -> Result<ProcessReport> {
        let extraction = extract_all(extractor, docs).await;
        self.process(extraction).await
    }

    /// 추출 결과로 인덱스 교체
    ///
    /// 텍스트가 없거나 임베딩이 실패하면 기존 인덱스는 그대로 남습니다.
    pub async fn process(&self, extraction: ExtractionReport) -> Result<ProcessReport> {
        if !extraction.has_text() {
            return Err(LawgicError::NothingToIndex {
                total: extraction.total(),
                failed: extraction.failures.len(),
            }
            .into());
        }

        let meta = self.index_text(&extraction.text).await?;

        Ok(ProcessReport {
            documents_total: extraction.total(),
            documents_indexed: extraction.extracted,
            failures: extraction.failures,
            characters: extraction.text.chars().count(),
            meta,
        })
    }

    /// 텍스트를 청킹/임베딩하여 인덱스 교체
    pub async fn index_text(&self, text: &str) -> Result<IndexMeta> {
        let chunks = self.chunker.chunk(text);
        let total = chunks.len();

        // 공백뿐인 청크는 임베딩하지 않음 (position은 청커 기준 유지)
        let (positions, chunks): (Vec<usize>, Vec<String>) = chunks
            .into_iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.trim().is_empty())
            .unzip();
        if chunks.len() < total {
            tracing::debug!("Skipping {} whitespace-only chunks", total - chunks.len());
        }
        if chunks.is_empty() {
            return Err(LawgicError::EmptyIndex.into());
        }

        tracing::info!(
            "Embedding {} chunks with {} ({})",
            chunks.len(),
            self.embedder.name(),
            self.chunker.name()
        );

        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .await
            .context("Failed to embed chunks")?;

        let dimension = self.embedder.dimension();
        if embeddings.len() != chunks.len() {
            return Err(LawgicError::embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(LawgicError::embedding(format!(
                "expected {} dimensions, got {}",
                dimension,
                bad.len()
            ))
            .into());
        }

        let entries: Vec<IndexedChunk> = positions
            .into_iter()
            .zip(chunks)
            .zip(embeddings)
            .map(|((position, text), embedding)| IndexedChunk {
                position,
                text,
                embedding,
            })
            .collect();

        let meta = IndexMeta::new(self.embedder.name(), dimension, entries.len(), text);
        self.store
            .replace(&meta, &entries)
            .await
            .context("Failed to write index")?;

        Ok(meta)
    }

    // ------------------------------------------------------------------------
    // Ask
    // ------------------------------------------------------------------------

    /// 질문과 관련된 상위 청크 검색
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        self.retrieve_top(question, self.top_k).await
    }

    /// 개수를 지정하여 검색
    ///
    /// 검색 결과와 함께 읽은 메타데이터로 모델 호환성을 다시 확인하므로,
    /// 도중에 인덱스가 교체되어도 다른 모델의 인덱스를 검색하지 않습니다.
    pub async fn retrieve_top(&self, question: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        if question.trim().is_empty() {
            anyhow::bail!("Question must not be empty");
        }

        // 임베딩 호출 전에 먼저 확인
        let meta = self
            .store
            .meta()
            .await
            .context("Failed to load index")?
            .ok_or_else(|| self.no_index())?;
        check_compatible(&meta, self.embedder.as_ref())?;

        let query_embedding = self
            .embedder
            .embed_query(question)
            .await
            .context("Failed to embed question")?;

        let (meta, results) = self
            .store
            .query(&query_embedding, limit)
            .await
            .context("Failed to search index")?
            .ok_or_else(|| self.no_index())?;
        check_compatible(&meta, self.embedder.as_ref())?;

        tracing::debug!("Retrieved {} chunks for question", results.len());
        Ok(results)
    }

    /// 질문에 답변
    ///
    /// 질문은 그대로 프롬프트에 들어가며, 검색 결과가 비어 있어도 모델에 전달합니다.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let context = self.retrieve(question).await?;
        let prompt = build_prompt(&context, question);

        let text = self
            .model
            .generate(&prompt)
            .await
            .context("Failed to generate answer")?;

        tracing::info!(
            "Answered with {} ({} context chunks)",
            self.model.name(),
            context.len()
        );

        Ok(Answer {
            question: question.to_string(),
            text,
            context,
        })
    }

    fn no_index(&self) -> LawgicError {
        LawgicError::NoIndex {
            location: PathBuf::from(self.store.location()),
        }
    }

    /// 현재 인덱스 메타데이터
    pub async fn index_meta(&self) -> Result<Option<IndexMeta>> {
        self.store.meta().await
    }
}

/// 인덱스의 임베딩 모델/차원이 현재 임베더와 같은지 확인
pub fn check_compatible(meta: &IndexMeta, embedder: &dyn EmbeddingProvider) -> Result<(), LawgicError> {
    if meta.embedding_model != embedder.name() || meta.dimension != embedder.dimension() {
        return Err(LawgicError::EmbeddingModelMismatch {
            indexed: meta.embedding_model.clone(),
            indexed_dimension: meta.dimension,
            current: embedder.name().to_string(),
            current_dimension: embedder.dimension(),
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NamedEmbedder(&'static str, usize);

    #[async_trait]
    impl EmbeddingProvider for NamedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; self.1])
        }

        fn dimension(&self) -> usize {
            self.1
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_check_compatible() {
        let meta = IndexMeta::new("gemini-embedding-001", 768, 1, "text");

        assert!(check_compatible(&meta, &NamedEmbedder("gemini-embedding-001", 768)).is_ok());

        let err = check_compatible(&meta, &NamedEmbedder("embedding-001", 768)).unwrap_err();
        assert!(matches!(err, LawgicError::EmbeddingModelMismatch { .. }));

        let err = check_compatible(&meta, &NamedEmbedder("gemini-embedding-001", 1536)).unwrap_err();
        assert!(err.to_string().contains("1536d"));
    }
}
