//! 프롬프트 템플릿
//!
//! 검색된 청크(context)와 질문을 고정 템플릿에 채워 넣는 순수 함수입니다.
//! 모델 호출 없이 테스트할 수 있습니다.

use super::vector::ScoredChunk;

/// 컨텍스트가 부족할 때 모델이 그대로 답해야 하는 문구
pub const NOT_AVAILABLE_ANSWER: &str = "answer is not available in the context";

/// 프롬프트 조립
///
/// 컨텍스트 청크는 검색 순위대로 빈 줄을 사이에 두고 이어 붙입니다.
/// 컨텍스트가 비어 있어도 프롬프트를 만들어 모델이 "not available"
/// 지시를 적용하게 합니다.
pub fn build_prompt(context: &[ScoredChunk], question: &str) -> String {
    let context_text = context
        .iter()
        .map(|c| c.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Answer the question as detailed as possible from the provided context.\n\
         If the answer is not in the provided context, just say, \"{not_available}.\"\n\
         Don't provide a wrong answer.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Answer:\n",
        not_available = NOT_AVAILABLE_ANSWER,
        context = context_text,
        question = question,
    )
}
