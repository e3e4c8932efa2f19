//! lawgic - PDF 문서 질의응답 RAG 시스템
//!
//! PDF에서 텍스트를 추출해 청크 단위로 Gemini 임베딩 인덱스를 만들고,
//! 질문과 관련된 청크를 찾아 Gemini 모델에 답변을 요청합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;

// Re-exports
pub use config::{get_api_key, has_api_key, Settings};
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use error::LawgicError;
pub use extractor::{
    extract_all, ExtractionFailure, ExtractionReport, PdfExtractor, SourceDocument, TextExtractor,
};
pub use generation::{AnswerModel, GeminiChat};
pub use knowledge::{
    build_prompt, Answer, CharacterChunker, ChunkConfig, Chunker, IndexMeta, IndexStore,
    IndexedChunk, MemoryIndexStore, ProcessReport, QaPipeline, ScoredChunk, SqliteIndexStore,
};
