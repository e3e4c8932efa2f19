//! Text Chunking Module
//!
//! 추출된 전체 텍스트를 겹치는 고정 크기 청크로 나눕니다.
//!
//! 청크 i가 `[start, end)` 문자 구간을 덮으면 다음 청크는 `end - overlap`에서
//! 시작합니다. 따라서 첫 청크 뒤에 나머지 청크들을 overlap만큼 잘라 붙이면
//! 원문이 정확히 복원됩니다 ([`rejoin`]). 길이 단위는 바이트가 아닌 문자입니다.

use crate::error::LawgicError;

/// 구분자 우선순위 (문단 > 줄 > 단어)
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
    /// 인접 청크 간 겹치는 문자 수
    pub overlap_characters: usize,
    /// 가능하면 문단/줄/단어 경계에서 자르기
    pub respect_separators: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 10_000,
            overlap_characters: 1_000,
            respect_separators: true,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_characters: usize, overlap_characters: usize) -> Self {
        Self {
            max_characters,
            overlap_characters,
            respect_separators: true,
        }
    }

    /// 경계 무시, 정확히 max 문자마다 자르기
    pub fn exact(max_characters: usize, overlap_characters: usize) -> Self {
        Self {
            respect_separators: false,
            ..Self::new(max_characters, overlap_characters)
        }
    }

    pub fn validate(&self) -> Result<(), LawgicError> {
        if self.max_characters == 0 {
            return Err(LawgicError::InvalidConfig(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.overlap_characters >= self.max_characters {
            return Err(LawgicError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap_characters, self.max_characters
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 인접 청크 간 겹치는 문자 수
    fn overlap(&self) -> usize;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// CharacterChunker
// ============================================================================

/// 문자 단위 슬라이딩 윈도우 청커
pub struct CharacterChunker {
    config: ChunkConfig,
}

impl CharacterChunker {
    /// 설정으로 생성 (설정 검증 포함)
    pub fn new(config: ChunkConfig) -> Result<Self, LawgicError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// `[start, hard_end)` 안에서 구분자 뒤의 자를 위치 찾기
    ///
    /// 청크가 `overlap + max/2` 문자보다 짧아지면 구분자를 쓰지 않고
    /// `hard_end`에서 자릅니다.
    fn find_break(&self, text: &str, bounds: &[usize], start: usize, hard_end: usize) -> usize {
        if !self.config.respect_separators {
            return hard_end;
        }

        let overlap = self.config.overlap_characters;
        let min_len = (overlap + self.config.max_characters / 2).max(overlap + 1);
        let min_end = start + min_len;
        if min_end > hard_end {
            return hard_end;
        }

        let window_start = bounds[start];
        let window = &text[window_start..bounds[hard_end]];

        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let cut = window_start + pos + sep.len();
                if let Ok(end) = bounds.binary_search(&cut) {
                    if end >= min_end {
                        return end;
                    }
                }
            }
        }

        hard_end
    }
}

impl Chunker for CharacterChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return vec![];
        }

        // 문자 인덱스 -> 바이트 오프셋 (마지막 원소는 text.len())
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + self.config.max_characters).min(total);
            let end = if hard_end == total {
                total
            } else {
                self.find_break(text, &bounds, start, hard_end)
            };

            chunks.push(text[bounds[start]..bounds[end]].to_string());

            if end == total {
                break;
            }
            start = end - self.config.overlap_characters;
        }

        chunks
    }

    fn overlap(&self) -> usize {
        self.config.overlap_characters
    }

    fn name(&self) -> &'static str {
        "CharacterChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 청크를 원문으로 복원 (각 청크 앞의 overlap 문자를 제거하고 연결)
pub fn rejoin(chunks: &[String], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(chunk);
        } else {
            text.extend(chunk.chars().skip(overlap));
        }
    }
    text
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(CharacterChunker::with_defaults())
}

/// 설정으로 청커 생성
pub fn character_chunker(config: ChunkConfig) -> Result<Box<dyn Chunker>, LawgicError> {
    Ok(Box::new(CharacterChunker::new(config)?))
}

// ============================================================================
// Tests
// ============================================================================
