//! 사용자에게 보여지는 실패 분류
//!
//! 내부 오류 전파는 `anyhow`를 사용하고, 명령을 종료시키는 실패는
//! 이 열거형으로 구분합니다. 호출 측은 `downcast_ref::<LawgicError>()`로
//! 종류를 판별할 수 있습니다.

use std::path::PathBuf;

use thiserror::Error;

/// lawgic 실패 종류
#[derive(Debug, Error)]
pub enum LawgicError {
    /// 어떤 문서에서도 텍스트를 추출하지 못함
    #[error("No text could be extracted from the uploaded documents ({failed} of {total} failed to read)")]
    NothingToIndex { total: usize, failed: usize },

    /// 청크가 하나도 없는 인덱스 작성 시도
    #[error("Refusing to build an index with zero chunks")]
    EmptyIndex,

    /// 아직 인덱스가 만들어지지 않음
    #[error("No index available at {location}. Run `lawgic process <PDF>...` first.")]
    NoIndex { location: PathBuf },

    /// 인덱스 생성 시점과 질의 시점의 임베딩 모델이 다름
    #[error(
        "Index was built with embedding model '{indexed}' ({indexed_dimension}d) \
         but the current embedder is '{current}' ({current_dimension}d). \
         Re-process the documents to rebuild the index."
    )]
    EmbeddingModelMismatch {
        indexed: String,
        indexed_dimension: usize,
        current: String,
        current_dimension: usize,
    },

    /// API 키 미설정
    #[error(
        "API key not found. Set GEMINI_API_KEY, GOOGLE_AI_API_KEY or GOOGLE_API_KEY \
         (environment or .env file).\nGet your API key at: https://aistudio.google.com/app/apikey"
    )]
    MissingApiKey,

    /// 임베딩/생성 프로바이더 실패
    #[error("{stage} provider failed: {message}")]
    Provider { stage: &'static str, message: String },

    /// 잘못된 설정값
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LawgicError {
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Provider {
            stage: "Embedding",
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Provider {
            stage: "Generation",
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_index_message_is_actionable() {
        let err = LawgicError::NoIndex {
            location: PathBuf::from("lawgic_index/index.db"),
        };
        let msg = err.to_string();
        assert!(msg.contains("lawgic_index/index.db"));
        assert!(msg.contains("lawgic process"));
    }

    #[test]
    fn test_provider_stage_in_message() {
        let err = LawgicError::generation("timeout");
        assert_eq!(err.to_string(), "Generation provider failed: timeout");
    }
}
