//! 설정 모듈
//!
//! `.env` 파일과 환경변수에서 실행 설정을 읽습니다.
//! 모든 값은 기본값이 있고, API 키만 필수입니다.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::embedding::{DEFAULT_DIMENSION, VALID_DIMENSIONS};
use crate::error::LawgicError;
use crate::knowledge::ChunkConfig;

/// 기본 인덱스 디렉토리 (작업 디렉토리 기준 상대 경로)
pub const DEFAULT_INDEX_DIR: &str = "lawgic_index";

/// 인덱스 파일 이름
pub const INDEX_FILE_NAME: &str = "index.db";

/// 기본 생성 모델
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// 기본 검색 청크 수
pub const DEFAULT_TOP_K: usize = 4;

/// API 키 환경변수 (우선순위 순)
const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY", "GOOGLE_API_KEY"];

// ============================================================================
// Settings
// ============================================================================

/// 실행 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// 인덱스 디렉토리
    pub index_dir: PathBuf,
    /// 임베딩 차원 (768, 1536, 3072)
    pub embedding_dimension: usize,
    /// 생성 모델 이름
    pub chat_model: String,
    /// 검색할 청크 수
    pub top_k: usize,
    /// 청킹 설정
    pub chunk: ChunkConfig,
    /// 429 응답 시 임베딩 재시도 횟수 (기본 0: 재시도 안 함)
    pub embed_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            embedding_dimension: DEFAULT_DIMENSION,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            chunk: ChunkConfig::default(),
            embed_retries: 0,
        }
    }
}

impl Settings {
    /// `.env` 로드 후 환경변수에서 설정 생성
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로부터 설정 생성
    ///
    /// 테스트에서 환경변수를 건드리지 않도록 분리되어 있습니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(dir) = non_empty(lookup("LAWGIC_INDEX_DIR")) {
            settings.index_dir = PathBuf::from(dir);
        }
        if let Some(model) = non_empty(lookup("LAWGIC_CHAT_MODEL")) {
            settings.chat_model = model;
        }
        if let Some(v) = non_empty(lookup("LAWGIC_EMBEDDING_DIMENSION")) {
            settings.embedding_dimension = parse_number("LAWGIC_EMBEDDING_DIMENSION", &v)?;
        }
        if let Some(v) = non_empty(lookup("LAWGIC_TOP_K")) {
            settings.top_k = parse_number("LAWGIC_TOP_K", &v)?;
        }
        if let Some(v) = non_empty(lookup("LAWGIC_CHUNK_SIZE")) {
            settings.chunk.max_characters = parse_number("LAWGIC_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = non_empty(lookup("LAWGIC_CHUNK_OVERLAP")) {
            settings.chunk.overlap_characters = parse_number("LAWGIC_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = non_empty(lookup("LAWGIC_EMBED_RETRIES")) {
            settings.embed_retries = parse_number("LAWGIC_EMBED_RETRIES", &v)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(LawgicError::InvalidConfig("LAWGIC_TOP_K must be at least 1".into()).into());
        }
        if !VALID_DIMENSIONS.contains(&self.embedding_dimension) {
            return Err(LawgicError::InvalidConfig(format!(
                "LAWGIC_EMBEDDING_DIMENSION must be 768, 1536, or 3072 (got {})",
                self.embedding_dimension
            ))
            .into());
        }
        self.chunk.validate()?;
        Ok(())
    }

    /// 인덱스 디렉토리 덮어쓰기 (CLI --index-dir)
    pub fn with_index_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.index_dir = dir;
        }
        self
    }

    /// 인덱스 파일 경로
    pub fn index_path(&self) -> PathBuf {
        index_path_in(&self.index_dir)
    }
}

/// 디렉토리 안의 인덱스 파일 경로
pub fn index_path_in(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE_NAME)
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
/// 3. `GOOGLE_API_KEY`
pub fn get_api_key() -> Result<String, LawgicError> {
    api_key_from(|key| std::env::var(key).ok())
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

fn api_key_from<F>(lookup: F) -> Result<String, LawgicError>
where
    F: Fn(&str) -> Option<String>,
{
    for var in API_KEY_VARS {
        if let Some(key) = non_empty(lookup(var)) {
            tracing::debug!("Using API key from {}", var);
            return Ok(key);
        }
    }
    Err(LawgicError::MissingApiKey)
}

// ============================================================================
// Helper Functions
// ============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LawgicError> {
    value
        .parse()
        .map_err(|_| LawgicError::InvalidConfig(format!("{} must be a number, got '{}'", key, value)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.index_path(), PathBuf::from("lawgic_index/index.db"));
        assert_eq!(settings.top_k, 4);
        assert_eq!(settings.chunk.max_characters, 10_000);
        assert_eq!(settings.chunk.overlap_characters, 1_000);
        assert_eq!(settings.embed_retries, 0);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("LAWGIC_INDEX_DIR", "/tmp/idx"),
            ("LAWGIC_TOP_K", "6"),
            ("LAWGIC_CHUNK_SIZE", "500"),
            ("LAWGIC_CHUNK_OVERLAP", "50"),
            ("LAWGIC_CHAT_MODEL", "gemini-2.5-pro"),
        ]))
        .unwrap();
        assert_eq!(settings.index_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(settings.top_k, 6);
        assert_eq!(settings.chunk.max_characters, 500);
        assert_eq!(settings.chunk.overlap_characters, 50);
        assert_eq!(settings.chat_model, "gemini-2.5-pro");
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = Settings::from_lookup(lookup_from(&[("LAWGIC_TOP_K", "four")])).unwrap_err();
        assert!(err.to_string().contains("LAWGIC_TOP_K"));
    }

    #[test]
    fn test_unsupported_embedding_dimension_rejected() {
        let err = Settings::from_lookup(lookup_from(&[("LAWGIC_EMBEDDING_DIMENSION", "1024")]))
            .unwrap_err();
        assert!(err.to_string().contains("LAWGIC_EMBEDDING_DIMENSION"));

        let settings =
            Settings::from_lookup(lookup_from(&[("LAWGIC_EMBEDDING_DIMENSION", "1536")])).unwrap();
        assert_eq!(settings.embedding_dimension, 1536);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        let result = Settings::from_lookup(lookup_from(&[
            ("LAWGIC_CHUNK_SIZE", "100"),
            ("LAWGIC_CHUNK_OVERLAP", "100"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_key_precedence() {
        let key = api_key_from(lookup_from(&[
            ("GOOGLE_API_KEY", "legacy"),
            ("GEMINI_API_KEY", "primary"),
        ]))
        .unwrap();
        assert_eq!(key, "primary");

        let key = api_key_from(lookup_from(&[("GOOGLE_API_KEY", "legacy")])).unwrap();
        assert_eq!(key, "legacy");
    }

    #[test]
    fn test_missing_api_key() {
        let err = api_key_from(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, LawgicError::MissingApiKey));
    }

    #[test]
    fn test_with_index_dir() {
        let settings = Settings::default().with_index_dir(Some(PathBuf::from("other")));
        assert_eq!(settings.index_path(), PathBuf::from("other/index.db"));
    }
}
