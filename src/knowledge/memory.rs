//! 메모리 인덱스 저장소 (테스트용 [`IndexStore`])
//!
//! 인덱스 전체를 `RwLock<Option<..>>` 하나에 담아 통째로 교체합니다.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::error::LawgicError;

use super::vector::{rank_top_k, IndexMeta, IndexStore, IndexedChunk, ScoredChunk};

struct Snapshot {
    meta: IndexMeta,
    entries: Vec<IndexedChunk>,
}

/// 메모리 인덱스 저장소
#[derive(Default)]
pub struct MemoryIndexStore {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Result<Option<Arc<Snapshot>>> {
        let guard = self
            .current
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn replace(&self, meta: &IndexMeta, entries: &[IndexedChunk]) -> Result<()> {
        if entries.is_empty() {
            return Err(LawgicError::EmptyIndex.into());
        }

        let snapshot = Arc::new(Snapshot {
            meta: meta.clone(),
            entries: entries.to_vec(),
        });

        let mut guard = self
            .current
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        *guard = Some(snapshot);
        Ok(())
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        Ok(self.snapshot()?.map(|s| s.meta.clone()))
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Option<(IndexMeta, Vec<ScoredChunk>)>> {
        let Some(snapshot) = self.snapshot()? else {
            return Ok(None);
        };

        let results = rank_top_k(
            query_embedding,
            snapshot
                .entries
                .iter()
                .map(|e| (e.position, e.text.as_str(), e.embedding.as_slice())),
            limit,
        );
        Ok(Some((snapshot.meta.clone(), results)))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.snapshot()?.map(|s| s.entries.len()).unwrap_or(0))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_replace() {
        let store = MemoryIndexStore::new();
        assert!(store.meta().await.unwrap().is_none());

        let first = vec![IndexedChunk {
            position: 0,
            text: "Clause A".into(),
            embedding: vec![1.0, 0.0],
        }];
        store
            .replace(&IndexMeta::new("m", 2, 1, "Clause A"), &first)
            .await
            .unwrap();

        let second = vec![IndexedChunk {
            position: 0,
            text: "Clause B".into(),
            embedding: vec![0.0, 1.0],
        }];
        store
            .replace(&IndexMeta::new("m", 2, 1, "Clause B"), &second)
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "Clause B");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_query_pairs_meta_with_results() {
        let store = MemoryIndexStore::new();
        assert!(store.query(&[1.0, 0.0], 4).await.unwrap().is_none());

        let entries = vec![IndexedChunk {
            position: 0,
            text: "Clause A".into(),
            embedding: vec![1.0, 0.0],
        }];
        store
            .replace(&IndexMeta::new("m", 2, 1, "Clause A"), &entries)
            .await
            .unwrap();

        let (meta, results) = store.query(&[1.0, 0.0], 4).await.unwrap().unwrap();
        assert_eq!(meta.embedding_model, "m");
        assert_eq!(meta.text_digest, IndexMeta::new("m", 2, 1, "Clause A").text_digest);
        assert_eq!(results[0].text, "Clause A");
    }

    #[tokio::test]
    async fn test_memory_store_rejects_empty() {
        let store = MemoryIndexStore::new();
        assert!(store
            .replace(&IndexMeta::new("m", 2, 0, ""), &[])
            .await
            .is_err());
        assert!(store.meta().await.unwrap().is_none());
    }
}
