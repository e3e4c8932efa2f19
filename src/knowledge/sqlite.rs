//! SQLite Index Store - 단일 파일 인덱스
//!
//! 인덱스 전체를 하나의 SQLite 파일(`index.db`)로 저장합니다.
//!
//! 교체 절차:
//! 1. 같은 디렉토리의 `index.db.tmp`에 새 인덱스를 한 트랜잭션으로 작성
//! 2. 연결을 닫은 뒤 `rename`으로 기존 파일을 덮어씀
//!
//! 읽기는 호출마다 파일을 새로 열기 때문에 항상 이전 또는 새 인덱스 중
//! 하나만 보입니다. 검색은 전수 코사인 비교입니다.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::LawgicError;

use super::vector::{rank_top_k, IndexMeta, IndexStore, IndexedChunk, ScoredChunk};

const SCHEMA: &str = r#"
CREATE TABLE index_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    embedding_model TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    text_digest TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE chunks (
    position INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

// ============================================================================
// SqliteIndexStore
// ============================================================================

/// SQLite 파일 기반 인덱스 저장소
#[derive(Debug, Clone)]
pub struct SqliteIndexStore {
    path: PathBuf,
}

impl SqliteIndexStore {
    /// 인덱스 파일 경로로 생성 (파일은 첫 `replace` 때 만들어짐)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 인덱스 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 임시 파일 경로 (`<name>.tmp`)
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("index.db"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// 읽기 전용으로 열기 (파일이 없으면 None)
    fn open_existing(&self) -> Result<Option<Connection>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open index: {:?}", self.path))?;

        Ok(Some(conn))
    }

    /// 임시 파일에 인덱스 전체 작성
    fn write_index(path: &Path, meta: &IndexMeta, entries: &[IndexedChunk]) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale temp index: {:?}", path))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to create temp index: {:?}", path))?;

        conn.execute_batch(SCHEMA)
            .context("Failed to create index schema")?;

        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute(
            "INSERT INTO index_meta (id, embedding_model, dimension, chunk_count, text_digest, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                meta.embedding_model,
                meta.dimension as i64,
                meta.chunk_count as i64,
                meta.text_digest,
                meta.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to write index metadata")?;

        {
            let mut stmt = tx
                .prepare("INSERT INTO chunks (position, text, embedding) VALUES (?1, ?2, ?3)")
                .context("Failed to prepare chunk insert")?;

            for entry in entries {
                stmt.execute(params![
                    entry.position as i64,
                    entry.text,
                    encode_embedding(&entry.embedding),
                ])
                .with_context(|| format!("Failed to insert chunk {}", entry.position))?;
            }
        }

        tx.commit().context("Failed to commit index")?;
        conn.close()
            .map_err(|(_, e)| anyhow::anyhow!("Failed to close temp index: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn replace(&self, meta: &IndexMeta, entries: &[IndexedChunk]) -> Result<()> {
        if entries.is_empty() {
            return Err(LawgicError::EmptyIndex.into());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create index directory")?;
            }
        }

        let temp_path = self.temp_path();
        if let Err(e) = Self::write_index(&temp_path, meta, entries) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to move new index into place: {:?}", self.path))?;

        tracing::info!(
            "Index replaced at {:?} ({} chunks, model={})",
            self.path,
            entries.len(),
            meta.embedding_model
        );
        Ok(())
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        let Some(conn) = self.open_existing()? else {
            return Ok(None);
        };
        read_meta(&conn)
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Option<(IndexMeta, Vec<ScoredChunk>)>> {
        let Some(mut conn) = self.open_existing()? else {
            return Ok(None);
        };

        // 메타데이터와 청크를 같은 읽기 트랜잭션에서 읽음
        let tx = conn.transaction().context("Failed to begin read")?;
        let Some(meta) = read_meta(&tx)? else {
            return Ok(None);
        };
        let results = scan_chunks(&tx, query_embedding, limit)?;
        tx.finish().context("Failed to end read")?;

        Ok(Some((meta, results)))
    }

    async fn count(&self) -> Result<usize> {
        let Some(conn) = self.open_existing()? else {
            return Ok(0);
        };

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .context("Failed to count chunks")?;
        Ok(count as usize)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// Readers
// ============================================================================

fn read_meta(conn: &Connection) -> Result<Option<IndexMeta>> {
    let row = conn
        .query_row(
            "SELECT embedding_model, dimension, chunk_count, text_digest, created_at
             FROM index_meta WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .context("Failed to read index metadata")?;

    let Some((embedding_model, dimension, chunk_count, text_digest, created_at)) = row else {
        return Ok(None);
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .context("Invalid index timestamp")?
        .with_timezone(&Utc);

    Ok(Some(IndexMeta {
        embedding_model,
        dimension: dimension as usize,
        chunk_count: chunk_count as usize,
        text_digest,
        created_at,
    }))
}

/// 전수 스캔 후 Top-K
fn scan_chunks(conn: &Connection, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
    let mut stmt = conn
        .prepare("SELECT position, text, embedding FROM chunks ORDER BY position")
        .context("Failed to prepare chunk scan")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })
        .context("Failed to scan chunks")?;

    let mut entries = Vec::new();
    for row in rows {
        let (position, text, blob) = row.context("Failed to read chunk row")?;
        entries.push((position as usize, text, decode_embedding(&blob)?));
    }

    Ok(rank_top_k(
        query_embedding,
        entries
            .iter()
            .map(|(position, text, embedding)| (*position, text.as_str(), embedding.as_slice())),
        limit,
    ))
}

// ============================================================================
// Embedding Encoding
// ============================================================================

/// f32 벡터를 little-endian 바이트로 변환
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// little-endian 바이트를 f32 벡터로 변환
fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        anyhow::bail!("Corrupt embedding blob ({} bytes)", bytes.len());
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(position: usize, text: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            position,
            text: text.to_string(),
            embedding,
        }
    }

    fn meta_for(entries: &[IndexedChunk]) -> IndexMeta {
        IndexMeta::new("test-model", 2, entries.len(), "text")
    }

    #[tokio::test]
    async fn test_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp_dir.path().join("index.db"));

        assert!(store.meta().await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_search() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp_dir.path().join("nested/index.db"));

        let entries = vec![
            entry(0, "rent clause", vec![1.0, 0.0]),
            entry(1, "term clause", vec![0.0, 1.0]),
        ];
        store.replace(&meta_for(&entries), &entries).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let meta = store.meta().await.unwrap().unwrap();
        assert_eq!(meta.embedding_model, "test-model");
        assert_eq!(meta.dimension, 2);
        assert_eq!(meta.chunk_count, 2);

        let results = store.search(&[0.1, 0.9], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "term clause");
        assert_eq!(results[0].position, 1);
    }

    #[tokio::test]
    async fn test_query_returns_meta_with_its_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp_dir.path().join("index.db"));
        assert!(store.query(&[1.0, 0.0], 4).await.unwrap().is_none());

        let first = vec![entry(0, "built by model-a", vec![1.0, 0.0])];
        store
            .replace(&IndexMeta::new("model-a", 2, 1, "a"), &first)
            .await
            .unwrap();

        let second = vec![entry(0, "built by model-b", vec![0.0, 1.0])];
        store
            .replace(&IndexMeta::new("model-b", 2, 1, "b"), &second)
            .await
            .unwrap();

        let (meta, results) = store.query(&[1.0, 0.0], 4).await.unwrap().unwrap();
        assert_eq!(meta.embedding_model, "model-b");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "built by model-b");
    }

    #[tokio::test]
    async fn test_replace_discards_previous_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp_dir.path().join("index.db"));

        let first = vec![entry(0, "Clause A", vec![1.0, 0.0]), entry(1, "Clause B", vec![0.5, 0.5])];
        store.replace(&meta_for(&first), &first).await.unwrap();

        let second = vec![entry(0, "Payment schedule", vec![0.0, 1.0])];
        store.replace(&meta_for(&second), &second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&[1.0, 0.0], 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "Payment schedule");
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_empty_replace_rejected_and_old_index_kept() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp_dir.path().join("index.db"));

        let first = vec![entry(0, "Clause A", vec![1.0, 0.0])];
        store.replace(&meta_for(&first), &first).await.unwrap();

        let err = store.replace(&meta_for(&[]), &[]).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<LawgicError>(), Some(LawgicError::EmptyIndex)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp_dir.path().join("index.db"));
        std::fs::write(store.temp_path(), b"half written garbage").unwrap();

        let entries = vec![entry(0, "fresh", vec![1.0, 0.0])];
        store.replace(&meta_for(&entries), &entries).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reader_opened_before_replace_sees_old_index() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.db");
        let store = SqliteIndexStore::new(&path);

        let first = vec![entry(0, "old", vec![1.0, 0.0]), entry(1, "old 2", vec![1.0, 0.0])];
        store.replace(&meta_for(&first), &first).await.unwrap();

        let reader = store.open_existing().unwrap().unwrap();

        let second = vec![entry(0, "new", vec![0.0, 1.0])];
        store.replace(&meta_for(&second), &second).await.unwrap();

        let old_count: i64 = reader
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(old_count, 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_embedding_encoding() {
        let embedding = vec![0.25, -1.5, 3.0];
        let decoded = decode_embedding(&encode_embedding(&embedding)).unwrap();
        assert_eq!(decoded, embedding);
        assert!(decode_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_temp_path() {
        let store = SqliteIndexStore::new("lawgic_index/index.db");
        assert_eq!(store.temp_path(), PathBuf::from("lawgic_index/index.db.tmp"));
    }
}
