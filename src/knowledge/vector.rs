//! Index Store - 인덱스 저장소 트레이트 및 유사도 유틸리티
//!
//! 인덱스는 마지막으로 처리한 문서 배치의 (청크, 임베딩) 전체 집합입니다.
//! `replace`는 항상 이전 인덱스를 통째로 교체하며, 읽는 쪽은
//! 이전 인덱스 또는 새 인덱스 중 하나를 온전히 보게 됩니다.

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Types
// ============================================================================

/// 인덱스 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    /// 청크 순서 (0-based, 동점 처리 기준)
    pub position: usize,
    /// 청크 텍스트
    pub text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub position: usize,
    pub text: String,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f32,
}

/// 인덱스 메타데이터
///
/// 질의 시 임베딩 모델/차원이 인덱스 생성 시와 같은지 검증하는 데 사용됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    /// 인덱싱된 전체 텍스트의 SHA-256
    pub text_digest: String,
    pub created_at: DateTime<Utc>,
}

impl IndexMeta {
    pub fn new(embedding_model: &str, dimension: usize, chunk_count: usize, text: &str) -> Self {
        Self {
            embedding_model: embedding_model.to_string(),
            dimension,
            chunk_count,
            text_digest: text_digest(text),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// IndexStore Trait
// ============================================================================

/// 인덱스 저장소 트레이트 (async)
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// 인덱스 전체 교체 (원자적)
    async fn replace(&self, meta: &IndexMeta, entries: &[IndexedChunk]) -> Result<()>;

    /// 현재 인덱스 메타데이터 (인덱스가 없으면 None)
    async fn meta(&self) -> Result<Option<IndexMeta>>;

    /// 같은 스냅샷에서 메타데이터와 상위 k개 청크를 함께 읽음 (인덱스가 없으면 None)
    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Option<(IndexMeta, Vec<ScoredChunk>)>>;

    /// 상위 k개 청크 검색 (인덱스가 없으면 빈 결과)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        Ok(self
            .query(query_embedding, limit)
            .await?
            .map(|(_, results)| results)
            .unwrap_or_default())
    }

    /// 청크 개수
    async fn count(&self) -> Result<usize>;

    /// 사람이 읽을 수 있는 위치 (오류 메시지용)
    fn location(&self) -> String;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 전수 비교 후 상위 k개 선택
///
/// 유사도 내림차순, 동점이면 position 오름차순 (먼저 삽입된 청크 우선).
pub fn rank_top_k<'a, I>(query_embedding: &[f32], entries: I, limit: usize) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = (usize, &'a str, &'a [f32])>,
{
    let mut scored: Vec<ScoredChunk> = entries
        .into_iter()
        .map(|(position, text, embedding)| ScoredChunk {
            position,
            text: text.to_string(),
            similarity: cosine_similarity(query_embedding, embedding),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.position.cmp(&b.position))
    });
    scored.truncate(limit);
    scored
}

/// 텍스트 SHA-256 (hex)
pub fn text_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatched_or_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_top_k_orders_by_similarity() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = [0.7, 0.7];
        let entries = vec![(0, "a", &a[..]), (1, "b", &b[..]), (2, "c", &c[..])];

        let ranked = rank_top_k(&[1.0, 0.1], entries, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "a");
        assert_eq!(ranked[1].text, "c");
    }

    #[test]
    fn test_rank_top_k_ties_first_inserted_wins() {
        let same = [0.5, 0.5];
        let entries = vec![(2, "late", &same[..]), (0, "early", &same[..]), (1, "mid", &same[..])];

        let ranked = rank_top_k(&[1.0, 1.0], entries, 3);
        let order: Vec<usize> = ranked.iter().map(|r| r.position).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_text_digest_stable() {
        assert_eq!(text_digest("abc"), text_digest("abc"));
        assert_ne!(text_digest("abc"), text_digest("abd"));
        assert_eq!(text_digest("").len(), 64);
    }
}
