//! 파일 수집 모듈
//!
//! CLI 인자로 받은 파일/폴더에서 처리할 PDF 목록을 만듭니다.
//! 폴더는 .gitignore 패턴을 존중하며 파일 이름 순으로 순회합니다.
//! 문서 순서가 이어 붙일 텍스트 순서가 되므로 결과 순서는 결정적입니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 파일 크기 (바이트)
    pub size: u64,
}

/// PDF 확장자 여부
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    /// 새 수집기 생성
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 여러 경로 수집 (입력 순서 유지, 중복 제거)
    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<CollectedFile>> {
        let mut files: Vec<CollectedFile> = Vec::new();

        for path in paths {
            let collected = if path.is_dir() {
                self.collect_directory(path)?
            } else {
                self.collect_file(path)?.into_iter().collect()
            };

            for file in collected {
                if !files.iter().any(|f| f.path == file.path) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }

    /// 단일 파일 수집
    ///
    /// 직접 지정한 파일은 확장자와 관계없이 포함합니다
    /// (PDF가 아니면 추출 단계에서 실패로 기록됨).
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }

        if !abs_path.is_file() {
            anyhow::bail!("Not a file: {:?}", abs_path);
        }

        let file = Self::describe(abs_path)?;
        Ok(self.should_include(&file).then_some(file))
    }

    /// 폴더 재귀 수집 (PDF만)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", abs_path);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            if !is_pdf_path(entry.path()) {
                continue;
            }

            match Self::describe(entry.path().to_path_buf()) {
                Ok(file) => {
                    if self.should_include(&file) {
                        files.push(file);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to collect file: {:#}", e);
                }
            }
        }

        tracing::info!("Collected {} PDF files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    fn describe(path: PathBuf) -> Result<CollectedFile> {
        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        Ok(CollectedFile {
            path,
            size: metadata.len(),
        })
    }

    /// 파일이 필터 조건을 만족하는지 확인
    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::warn!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }
        true
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_pdf_path() {
        assert!(is_pdf_path(Path::new("judgment.pdf")));
        assert!(is_pdf_path(Path::new("JUDGMENT.PDF")));
        assert!(!is_pdf_path(Path::new("notes.txt")));
        assert!(!is_pdf_path(Path::new("pdf")));
    }

    #[test]
    fn test_collector_config_default() {
        let config = CollectorConfig::default();
        assert!(config.respect_gitignore);
        assert!(!config.include_hidden);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
    }

    #[test]
    fn test_collect_directory_pdfs_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"skip").unwrap();

        let files = FileCollector::with_defaults()
            .collect_directory(dir.path())
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_collect_keeps_argument_order_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("z.pdf");
        let second = dir.path().join("a.pdf");
        std::fs::write(&first, b"%PDF-").unwrap();
        std::fs::write(&second, b"%PDF-").unwrap();

        let files = FileCollector::with_defaults()
            .collect(&[first.clone(), second.clone(), first.clone()])
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, first);
        assert_eq!(files[1].path, second);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = FileCollector::with_defaults().collect(&[dir.path().join("missing.pdf")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let collector = FileCollector::new(CollectorConfig {
            max_file_size: 10,
            ..Default::default()
        });
        assert!(collector.collect_file(&path).unwrap().is_none());
    }
}
