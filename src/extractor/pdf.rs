//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use anyhow::{Context, Result};

use super::{SourceDocument, TextExtractor};

/// PDF 파일 시그니처
const PDF_MAGIC: &[u8] = b"%PDF-";

/// PDF 추출기
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, doc: &SourceDocument) -> Result<String> {
        let pages = extract_pages(&doc.bytes)
            .with_context(|| format!("Failed to extract text from PDF: {}", doc.name))?;

        let empty_pages = pages.iter().filter(|p| p.is_empty()).count();
        if empty_pages == pages.len() {
            tracing::warn!(
                "No text extracted from PDF: {}. It might be a scanned document.",
                doc.name
            );
        } else if empty_pages > 0 {
            tracing::debug!("{}: {} of {} pages had no text", doc.name, empty_pages, pages.len());
        }

        Ok(pages.concat())
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}

/// PDF 바이트에서 페이지별 텍스트 추출
///
/// 텍스트가 없는 페이지는 빈 문자열로 남습니다.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>> {
    if !is_pdf(bytes) {
        anyhow::bail!("not a PDF document (missing %PDF- header)");
    }

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(split_pdf_pages(&text))
}

/// PDF 시그니처 확인
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// PDF 텍스트를 페이지별로 분리
///
/// pdf-extract는 페이지 사이에 폼피드 문자(\x0c)를 넣습니다.
/// 공백뿐인 페이지는 빈 문자열이 됩니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    text.split('\x0c')
        .map(|page| {
            if page.trim().is_empty() {
                String::new()
            } else {
                page.to_string()
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[1], "Page 2 content");
    }

    #[test]
    fn test_split_pdf_pages_blank_page_is_empty_string() {
        let pages = split_pdf_pages("Cover\x0c \n \x0cBody");
        assert_eq!(pages, vec!["Cover", "", "Body"]);
        assert_eq!(pages.concat(), "CoverBody");
    }

    #[test]
    fn test_split_pdf_pages_no_separator() {
        let pages = split_pdf_pages("Just some text without page breaks");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_non_pdf_rejected() {
        let doc = SourceDocument::new("notes.pdf", b"hello world".to_vec());
        let err = PdfExtractor.extract(&doc).unwrap_err();
        assert!(format!("{:#}", err).contains("not a PDF document"));
    }
}
