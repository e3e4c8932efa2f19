//! Knowledge 모듈 - 청킹, 인덱스 저장소, 질의응답 파이프라인
//!
//! - Chunker: 겹치는 고정 크기 문자 청크
//! - IndexStore: 인덱스 전체 교체 + Top-K 코사인 검색
//!   - SqliteIndexStore: 임시 파일 작성 후 rename
//!   - MemoryIndexStore: 테스트용
//! - Prompt: 컨텍스트 + 질문 템플릿
//! - QaPipeline: process / ask

mod chunker;
mod memory;
mod pipeline;
mod prompt;
mod sqlite;
mod vector;

// Re-exports
pub use chunker::{
    character_chunker, default_chunker, rejoin, CharacterChunker, ChunkConfig, Chunker,
};
pub use memory::MemoryIndexStore;
pub use pipeline::{check_compatible, Answer, ProcessReport, QaPipeline, DEFAULT_TOP_K};
pub use prompt::{build_prompt, NOT_AVAILABLE_ANSWER};
pub use sqlite::SqliteIndexStore;
pub use vector::{
    cosine_similarity, rank_top_k, text_digest, IndexMeta, IndexStore, IndexedChunk, ScoredChunk,
};
